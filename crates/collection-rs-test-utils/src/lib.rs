//! Various helper functions for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use collection_rs::installation::download::{Catalog, DownloadError, RetryPolicy, Transfer};
use collection_rs::manifest::{Package, PackageSource};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("zip error: {0}")]
	Zip(#[from] zip::result::ZipError),
	#[error("collection-rs error: {0}")]
	CollectionRs(#[from] collection_rs::Error),
}

/// A host instance in a temporary directory, removed when the [`tempfile::TempDir`] drops.
pub fn temp_host() -> Result<(tempfile::TempDir, collection_rs::HostInstance), Error> {
	let dir = tempfile::tempdir()?;
	let instance = collection_rs::HostInstance::new(dir.path().join("host"), "Default")?;
	Ok((dir, instance))
}

/// Writes `(relative path, content)` pairs below `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> Result<(), Error> {
	for (path, content) in files {
		let path = root.join(path);
		std::fs::create_dir_all(path.with_file_name(""))?;
		std::fs::write(path, content)?;
	}
	Ok(())
}

/// Writes a zip archive holding `(relative path, content)` pairs.
pub fn write_zip(archive: &Path, files: &[(&str, &str)]) -> Result<(), Error> {
	if let Some(parent) = archive.parent() {
		std::fs::create_dir_all(parent)?;
	}
	let mut zip = zip::ZipWriter::new(std::fs::File::create(archive)?);
	let options = zip::write::FileOptions::default();
	for (path, content) in files {
		zip.start_file(*path, options)?;
		zip.write_all(content.as_bytes())?;
	}
	zip.finish()?;
	Ok(())
}

/// Package downloaded from a plain URL.
pub fn direct_package(index: usize, name: &str, url: &str) -> Package {
	Package::new(index, name, PackageSource::Direct { url: url.to_string() })
}

/// Retry settings without the pause between passes.
pub fn fast_retry() -> RetryPolicy {
	RetryPolicy { backoff: std::time::Duration::ZERO, ..Default::default() }
}

/// What a [`ScriptedTransfer`] does for one request.
#[derive(Debug, Clone)]
pub enum Response {
	/// Serves the content of a local file.
	File(PathBuf),
	Timeout,
	Refused,
	Empty,
	Status(u16),
}

/// [`Transfer`] answering from a script per URL.
///
/// Each request takes the next response for its URL, the last one repeats forever.
/// Unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct ScriptedTransfer {
	responses: Mutex<HashMap<String, VecDeque<Response>>>,
	attempts: Mutex<HashMap<String, u32>>,
}

impl ScriptedTransfer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn script(self, url: &str, responses: Vec<Response>) -> Self {
		if let Ok(mut map) = self.responses.lock() {
			map.insert(url.to_string(), responses.into());
		}
		self
	}

	/// Requests made for `url` so far.
	pub fn attempts(&self, url: &str) -> u32 {
		self.attempts.lock().map(|a| a.get(url).copied().unwrap_or(0)).unwrap_or(0)
	}

	fn next_response(&self, url: &str) -> Response {
		let mut map = match self.responses.lock() {
			Ok(m) => m,
			Err(p) => p.into_inner(),
		};
		match map.get_mut(url) {
			Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Response::Status(404)),
			Some(queue) => queue.front().cloned().unwrap_or(Response::Status(404)),
			None => Response::Status(404),
		}
	}
}

impl Transfer for ScriptedTransfer {
	fn fetch(&self, url: &str, _auth_token: Option<&str>, destination: &Path) -> Result<u64, DownloadError> {
		if let Ok(mut attempts) = self.attempts.lock() {
			*attempts.entry(url.to_string()).or_default() += 1;
		}

		match self.next_response(url) {
			Response::File(source) => Ok(std::fs::copy(source, destination)?),
			Response::Timeout => Err(DownloadError::Timeout(url.to_string())),
			Response::Refused => Err(DownloadError::Connect(url.to_string())),
			Response::Empty => Err(DownloadError::EmptyResponse),
			Response::Status(code) => Err(DownloadError::Rejected(code)),
		}
	}
}

/// [`Catalog`] with a fixed link per id pair.
#[derive(Debug, Default)]
pub struct StaticCatalog {
	links: HashMap<(i64, i64), String>,
}

impl StaticCatalog {
	pub fn with_link(mut self, mod_id: i64, file_id: i64, url: &str) -> Self {
		self.links.insert((mod_id, file_id), url.to_string());
		self
	}
}

impl Catalog for StaticCatalog {
	fn download_links(&self, mod_id: i64, file_id: i64) -> Result<Vec<String>, DownloadError> {
		self.links.get(&(mod_id, file_id)).map(|l| vec![l.clone()]).ok_or(DownloadError::Rejected(403))
	}
}
