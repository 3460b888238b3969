//! Bounded thread pool draining a shared FIFO queue.
//!
//! Jobs report [`JobStatus`] so the pool can keep its own counters, anything else a job
//! produces travels back to the caller through a channel the job captured.
//! A job that fails or panics never takes the pool or its siblings down with it.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

pub type Job = Box<dyn FnOnce() -> JobStatus + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
	Completed,
	Failed,
}

/// Counters of a pool, `enqueued == completed + failed` once drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
	pub enqueued: usize,
	pub completed: usize,
	pub failed: usize,
}

#[derive(Default)]
struct QueueState {
	queue: VecDeque<Job>,
	active: usize,
	shutdown: bool,
	stats: PoolStats,
}

#[derive(Default)]
struct Shared {
	state: Mutex<QueueState>,
	/// Signalled when a job is queued or on shutdown.
	available: Condvar,
	/// Signalled when the queue is empty and no job is running.
	idle: Condvar,
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, QueueState> {
		/* Jobs run outside the lock and panics are caught, the state is never left half written */
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

pub struct WorkerPool {
	name: String,
	shared: Arc<Shared>,
	workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
	/// Starts `threads` workers, at least one.
	///
	/// # Parameters
	/// - `name` - Prefix for the worker thread names, shows up in logs and panics.
	/// - `threads` - Number of workers.
	/// # Errors
	/// When the OS refuses to spawn a thread. Workers started before the failure are shut down.
	pub fn new(name: impl Into<String>, threads: usize) -> std::io::Result<Self> {
		let mut pool = WorkerPool {
			name: name.into(),
			shared: Arc::new(Shared::default()),
			workers: Vec::new(),
		};

		for i in 0..threads.max(1) {
			let shared = Arc::clone(&pool.shared);
			let handle = std::thread::Builder::new()
				.name(format!("{}-{}", pool.name, i))
				.spawn(move || worker_loop(shared))?;
			pool.workers.push(handle);
		}

		log::debug!("Started pool \"{}\" with {} workers", pool.name, pool.workers.len());
		Ok(pool)
	}

	/// Queues a job, never blocks on job execution.
	pub fn submit<F>(&self, job: F)
	where F: FnOnce() -> JobStatus + Send + 'static
	{
		let mut state = self.shared.lock();
		state.queue.push_back(Box::new(job));
		state.stats.enqueued += 1;
		drop(state);
		self.shared.available.notify_one();
	}

	/// Blocks until the queue is empty and no job is running.
	///
	/// # Returns
	/// The counters at the time the pool went idle.
	pub fn drain(&self) -> PoolStats {
		let mut state = self.shared.lock();
		while !(state.queue.is_empty() && state.active == 0) {
			state = self.shared.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
		}
		state.stats
	}

	pub fn stats(&self) -> PoolStats {
		self.shared.lock().stats
	}

	/// Number of jobs currently running.
	pub fn active(&self) -> usize {
		self.shared.lock().active
	}

	/// Number of jobs waiting for a worker.
	pub fn queued(&self) -> usize {
		self.shared.lock().queue.len()
	}

	pub fn threads(&self) -> usize {
		self.workers.len()
	}

	/// Stops the workers once every queued job has run and waits for them to exit.
	pub fn shutdown(mut self) -> PoolStats {
		self.stop();
		self.shared.lock().stats
	}

	fn stop(&mut self) {
		self.shared.lock().shutdown = true;
		self.shared.available.notify_all();

		for handle in self.workers.drain(..) {
			if handle.join().is_err() {
				log::error!("A worker of pool \"{}\" exited abnormally", self.name);
			}
		}
	}
}

impl Drop for WorkerPool {
	fn drop(&mut self) {
		self.stop();
	}
}

fn worker_loop(shared: Arc<Shared>) {
	loop {
		let job = {
			let mut state = shared.lock();
			loop {
				if let Some(job) = state.queue.pop_front() {
					state.active += 1;
					break job;
				}
				if state.shutdown {
					return;
				}
				state = shared.available.wait(state).unwrap_or_else(PoisonError::into_inner);
			}
		};

		let status = match std::panic::catch_unwind(AssertUnwindSafe(job)) {
			Ok(status) => status,
			Err(_) => {
				log::error!("Job panicked on {}", std::thread::current().name().unwrap_or("worker"));
				JobStatus::Failed
			},
		};

		let mut state = shared.lock();
		match status {
			JobStatus::Completed => state.stats.completed += 1,
			JobStatus::Failed => state.stats.failed += 1,
		}
		state.active -= 1;
		let idle = state.queue.is_empty() && state.active == 0;
		drop(state);

		if idle {
			shared.idle.notify_all();
		}
	}
}
