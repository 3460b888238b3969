//! Drives downloads and installs through their worker pools.
//!
//! Tasks send a typed outcome back over a channel, the coordinator reads those to chain
//! installs onto finished downloads, schedule retry passes and keep the report.
//! No failure crosses a task boundary, they all end up in [`PipelineReport::failures`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use super::download::{self, Catalog, DownloadError, RetryPolicy, Transfer};
use super::extract::Extractor;
use super::install::{self, InstallError, InstallJob, InstallReport};
use super::materialize::Materializer;
use super::worker_pool::{JobStatus, PoolStats, WorkerPool};
use crate::manifest::{Package, PackageSource};

static SCRATCH_ORDINAL: AtomicUsize = AtomicUsize::new(0);

/// The pieces of the pipeline that talk to the outside world.
#[derive(Clone)]
pub struct Collaborators {
	pub transfer: Arc<dyn Transfer>,
	/// Needed for remote packages only.
	pub catalog: Option<Arc<dyn Catalog>>,
	pub extractor: Arc<dyn Extractor>,
	pub materializer: Arc<dyn Materializer>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
	pub mods_dir: PathBuf,
	pub downloads_dir: PathBuf,
	pub scratch_dir: PathBuf,
	pub download_threads: usize,
	pub install_threads: usize,
	pub retry: RetryPolicy,
	pub auth_token: Option<String>,
}

impl PipelineOptions {
	pub fn new(config: &crate::Config, instance: &crate::HostInstance) -> Self {
		Self {
			mods_dir: instance.mods_dir(),
			downloads_dir: instance.downloads_dir(),
			scratch_dir: instance.scratch_dir(),
			download_threads: config.download_threads(),
			install_threads: config.install_threads(),
			retry: RetryPolicy::from_config(config),
			auth_token: config.api_key().map(str::to_string),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Download,
	Install,
}

#[derive(Debug, Clone)]
pub struct TaskFailure {
	pub package_index: usize,
	pub package_name: String,
	pub stage: Stage,
	pub reason: String,
	/// Download attempts made, 1 for install failures.
	pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	/// The package folder already has content.
	AlreadyInstalled,
	/// Nothing to download from.
	NoSource,
	/// No folder name was assigned before the run.
	NoFolder,
}

/// Decides whether to go on after downloads failed for good.
pub trait ContinuePolicy {
	fn proceed(&self, failures: &[TaskFailure]) -> bool;
}

/// Always goes on, what `--yes` maps to.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysContinue;

impl ContinuePolicy for AlwaysContinue {
	fn proceed(&self, _failures: &[TaskFailure]) -> bool {
		true
	}
}

/// Declines once all download retry passes are done, when any download failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverContinue;

impl ContinuePolicy for NeverContinue {
	fn proceed(&self, _failures: &[TaskFailure]) -> bool {
		false
	}
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
	pub downloaded: usize,
	pub installed: usize,
	pub skipped: Vec<(usize, SkipReason)>,
	pub failures: Vec<TaskFailure>,
	/// Installs that completed short of files.
	pub warnings: usize,
	/// Set when the continue policy declined after download failures.
	pub aborted: bool,
	/// Summed over every download pass.
	pub download_stats: PoolStats,
	/// Worker count of each download pass, the first entry is the initial pass.
	pub download_passes: Vec<usize>,
	pub install_stats: PoolStats,
	pub installs: Vec<(usize, InstallReport)>,
}

impl PipelineReport {
	pub fn succeeded(&self) -> bool {
		self.failures.is_empty() && !self.aborted
	}

	pub fn failed_stage(&self, stage: Stage) -> usize {
		self.failures.iter().filter(|f| f.stage == stage).count()
	}
}

#[derive(Debug)]
pub enum DownloadOutcome {
	Success { package_index: usize, archive: PathBuf },
	Failure { package_index: usize, error: DownloadError },
}

#[derive(Debug)]
pub struct InstallOutcome {
	pub package_index: usize,
	pub result: Result<InstallReport, InstallError>,
}

pub struct Pipeline {
	options: PipelineOptions,
	collaborators: Collaborators,
}

fn add_stats(total: &mut PoolStats, pass: PoolStats) {
	total.enqueued += pass.enqueued;
	total.completed += pass.completed;
	total.failed += pass.failed;
}

fn dir_has_content(dir: &std::path::Path) -> bool {
	std::fs::read_dir(dir).map_or(false, |mut d| d.next().is_some())
}

impl Pipeline {
	pub fn new(options: PipelineOptions, collaborators: Collaborators) -> Self {
		Self { options, collaborators }
	}

	/// Downloads and installs every package that needs it.
	///
	/// Packages with content in their folder are skipped, as are those with nothing to download from.
	/// Archives already in the downloads directory are installed without a download.
	///
	/// # Parameters
	/// - `packages` - Manifest packages with their folder names assigned, reports refer to them by position.
	/// - `policy` - Asked once when downloads failed after all retries, declining marks the report aborted.
	/// Installs already running still finish.
	/// # Errors
	/// Only when a worker pool can't be started.
	pub fn run(&self, packages: Arc<[Package]>, policy: &dyn ContinuePolicy) -> std::io::Result<PipelineReport> {
		let mut report = PipelineReport::default();
		let (install_tx, install_rx) = mpsc::channel::<InstallOutcome>();
		let install_pool = WorkerPool::new("install", self.options.install_threads)?;
		let mut install_submitted = Vec::<usize>::new();

		let mut to_download = Vec::<usize>::new();
		for (index, package) in packages.iter().enumerate() {
			let folder = match package.folder_name() {
				Some(f) => f,
				None => {
					log::warn!("Package {} has no folder name, skipping.", package);
					report.skipped.push((index, SkipReason::NoFolder));
					continue;
				},
			};

			if dir_has_content(&self.options.mods_dir.join(folder)) {
				log::info!("Package {} already installed, skipping.", package);
				report.skipped.push((index, SkipReason::AlreadyInstalled));
			} else if package.source == PackageSource::None {
				log::warn!("Package {} has no download source, skipping.", package);
				report.skipped.push((index, SkipReason::NoSource));
			} else if let Some(archive) = download::find_existing_archive(&self.options.downloads_dir, package) {
				log::info!("Using existing archive {} for {}", archive.display(), package);
				self.submit_install(&install_pool, &install_tx, &packages, index, archive);
				install_submitted.push(index);
			} else {
				to_download.push(index);
			}
		}

		let mut attempts = vec![0u32; packages.len()];
		let mut pending = to_download;
		let mut pass = 0u32;

		while !pending.is_empty() {
			let threads = if pass == 0 {
				self.options.download_threads
			} else {
				log::info!("Retrying {} downloads in {:?} (pass {} of {})", pending.len(), self.options.retry.backoff, pass, self.options.retry.max_retries);
				std::thread::sleep(self.options.retry.backoff);
				self.options.retry.retry_threads.min(self.options.download_threads)
			};

			let pool = WorkerPool::new(format!("download-{}", pass), threads)?;
			report.download_passes.push(pool.threads());
			let (tx, rx) = mpsc::channel::<DownloadOutcome>();
			for &index in &pending {
				attempts[index] += 1;
				self.submit_download(&pool, &tx, &packages, index);
			}
			drop(tx);

			let mut reported = HashSet::<usize>::new();
			let mut retry = Vec::<usize>::new();
			/* Ends once every job has finished and dropped its sender */
			for outcome in rx.iter() {
				match outcome {
					DownloadOutcome::Success { package_index, archive } => {
						reported.insert(package_index);
						report.downloaded += 1;
						self.submit_install(&install_pool, &install_tx, &packages, package_index, archive);
						install_submitted.push(package_index);
					},
					DownloadOutcome::Failure { package_index, error } => {
						reported.insert(package_index);
						let package = &packages[package_index];
						if error.is_transient() && pass < self.options.retry.max_retries {
							log::warn!("Download of {} failed ({}), will retry.", package, error);
							retry.push(package_index);
						} else {
							log::error!("Download of {} failed after {} attempts: {}", package, attempts[package_index], error);
							report.failures.push(TaskFailure {
								package_index,
								package_name: package.name.clone(),
								stage: Stage::Download,
								reason: error.to_string(),
								attempts: attempts[package_index],
							});
						}
					},
				}
			}

			add_stats(&mut report.download_stats, pool.drain());
			pool.shutdown();

			for &index in pending.iter().filter(|i| !reported.contains(i)) {
				report.failures.push(TaskFailure {
					package_index: index,
					package_name: packages[index].name.clone(),
					stage: Stage::Download,
					reason: "download task panicked".to_string(),
					attempts: attempts[index],
				});
			}

			retry.sort_unstable();
			pending = retry;
			pass += 1;
		}

		if report.failed_stage(Stage::Download) > 0 && !policy.proceed(&report.failures) {
			log::warn!("Stopping after download failures, waiting for running installs.");
			report.aborted = true;
		}

		report.install_stats = install_pool.drain();
		install_pool.shutdown();
		drop(install_tx);

		let mut reported = HashSet::<usize>::new();
		for outcome in install_rx.try_iter() {
			reported.insert(outcome.package_index);
			let package = &packages[outcome.package_index];
			match outcome.result {
				Ok(install_report) => {
					report.installed += 1;
					report.warnings += install_report.warnings();
					report.installs.push((outcome.package_index, install_report));
				},
				Err(e) => {
					log::error!("Install of {} failed: {}", package, e);
					report.failures.push(TaskFailure {
						package_index: outcome.package_index,
						package_name: package.name.clone(),
						stage: Stage::Install,
						reason: e.to_string(),
						attempts: 1,
					});
				},
			}
		}
		for index in install_submitted.into_iter().filter(|i| !reported.contains(i)) {
			report.failures.push(TaskFailure {
				package_index: index,
				package_name: packages[index].name.clone(),
				stage: Stage::Install,
				reason: "install task panicked".to_string(),
				attempts: 1,
			});
		}

		report.installs.sort_by_key(|(index, _)| *index);
		report.failures.sort_by_key(|f| (f.package_index, f.stage == Stage::Install));

		log::info!("Pipeline finished: {} downloaded, {} installed, {} skipped, {} failed, {} warnings",
			report.downloaded, report.installed, report.skipped.len(), report.failures.len(), report.warnings);
		Ok(report)
	}

	fn submit_download(&self, pool: &WorkerPool, tx: &mpsc::Sender<DownloadOutcome>, packages: &Arc<[Package]>, index: usize) {
		let tx = tx.clone();
		let packages = Arc::clone(packages);
		let collaborators = self.collaborators.clone();
		let downloads_dir = self.options.downloads_dir.clone();
		let auth_token = self.options.auth_token.clone();

		pool.submit(move || {
			let package = &packages[index];
			let result = download::download_package(
				package,
				&downloads_dir,
				collaborators.transfer.as_ref(),
				collaborators.catalog.as_deref(),
				auth_token.as_deref(),
			);

			let (outcome, status) = match result {
				Ok(archive) => (DownloadOutcome::Success { package_index: index, archive }, JobStatus::Completed),
				Err(error) => (DownloadOutcome::Failure { package_index: index, error }, JobStatus::Failed),
			};
			let _ = tx.send(outcome);
			status
		});
	}

	fn submit_install(&self, pool: &WorkerPool, tx: &mpsc::Sender<InstallOutcome>, packages: &Arc<[Package]>, index: usize, archive: PathBuf) {
		let package = &packages[index];
		let folder = package.folder_name().unwrap_or(&package.name);
		let job = InstallJob {
			package_index: index,
			package_name: package.name.clone(),
			archive,
			destination: self.options.mods_dir.join(folder),
			scratch: self.options.scratch_dir.join(format!("{}_{}", index, SCRATCH_ORDINAL.fetch_add(1, Ordering::Relaxed))),
			choices: package.choices.clone(),
			expected_files: package.expected_files.clone(),
		};

		let tx = tx.clone();
		let extractor = Arc::clone(&self.collaborators.extractor);
		let materializer = Arc::clone(&self.collaborators.materializer);

		pool.submit(move || {
			let result = install::install_package(&job, extractor.as_ref(), materializer.as_ref());
			let status = if result.is_ok() { JobStatus::Completed } else { JobStatus::Failed };
			let _ = tx.send(InstallOutcome { package_index: job.package_index, result });
			status
		});
	}
}
