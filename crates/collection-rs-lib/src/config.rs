//! User configuration.
//!
//! Stored as JSON in the data directory and loaded with [`Config::load_from_disk`].
//! Command line front ends are expected to apply their overrides on top of the loaded value.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
	data_dir: PathBuf,
	api_key: Option<String>,
	https_only: bool,
	download_threads: Option<usize>,
	install_threads: Option<usize>,
	download_retries: u32,
	retry_backoff_secs: u64,
	retry_threads: usize,
	request_timeout_secs: u64,
	sevenzip_command: Option<PathBuf>,
	sorter_command: Option<String>,
	profile: String,
}

/// Smallest worker count used when the host does not report its parallelism or reports less.
pub const MIN_WORKER_THREADS: usize = 4;

fn default_data_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	let path = std::env::var("APPDATA").map(PathBuf::from).unwrap_or_default();

	#[cfg(not(target_os = "windows"))]
	let path = if let Ok(e) = std::env::var("XDG_DATA_HOME") {
		PathBuf::from(e)
	} else if let Ok(home) = std::env::var("HOME") {
		PathBuf::from(home).join(".local/share")
	} else {
		PathBuf::default()
	};

	path.join("collection-rs")
}

impl Default for Config {
	fn default() -> Self {
		Self {
			data_dir: default_data_dir(),
			api_key: None,
			https_only: true,
			download_threads: None,
			install_threads: None,
			download_retries: 3,
			retry_backoff_secs: 2,
			retry_threads: 4,
			request_timeout_secs: 60,
			sevenzip_command: None,
			sorter_command: None,
			profile: "Default".to_string(),
		}
	}
}

impl Config {
	/// Loads the config from `config.json` in the default data directory.
	///
	/// When no API key is set in the file, `apikey.txt` next to it is read instead.
	///
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when the file can't be opened.
	/// - [`SerdeJSON`](crate::error::Error::SerdeJSON) when the file is malformed.
	pub fn load_from_disk() -> crate::Result<Self> {
		Self::load_from_dir(default_data_dir())
	}

	/// Same as [`load_from_disk`](Config::load_from_disk) but reads from `data_dir`.
	pub fn load_from_dir(data_dir: impl AsRef<Path>) -> crate::Result<Self> {
		let data_dir = data_dir.as_ref();
		let file = std::fs::File::open(data_dir.join("config.json"))?;
		let mut config: Config = serde_json::from_reader(file)?;
		config.data_dir = data_dir.to_path_buf();

		if config.api_key.is_none() {
			config.api_key = read_api_key_file(&data_dir.join("apikey.txt"));
		}

		Ok(config)
	}

	/// Saves the config to `config.json` in the data directory.
	///
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when creating the directory or file.
	/// - [`SerdeJSON`](crate::error::Error::SerdeJSON) when serializing.
	pub fn save_to_disk(&self) -> crate::Result<()> {
		std::fs::create_dir_all(&self.data_dir)?;
		let file = std::fs::File::create(self.data_dir.join("config.json"))?;
		serde_json::to_writer_pretty(file, self)?;
		Ok(())
	}

	pub fn data_dir(&self) -> &Path {
		&self.data_dir
	}
	/// returns if the directory is valid or not.
	pub fn set_data_dir(&mut self, data_dir: PathBuf) -> bool {
		if data_dir.is_dir() {
			self.data_dir = data_dir;
			true
		} else {
			false
		}
	}

	pub fn api_key(&self) -> Option<&str> {
		self.api_key.as_deref()
	}
	pub fn set_api_key(&mut self, api_key: Option<String>) {
		self.api_key = api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
	}

	pub fn https_only(&self) -> bool {
		self.https_only
	}
	pub fn set_https_only(&mut self, https_only: bool) {
		self.https_only = https_only;
	}

	/// Number of threads in the download pool.
	pub fn download_threads(&self) -> usize {
		self.download_threads.unwrap_or_else(default_thread_count)
	}
	/// returns if the value was accepted, zero is not.
	pub fn set_download_threads(&mut self, threads: usize) -> bool {
		if threads == 0 {
			return false;
		}
		self.download_threads = Some(threads);
		true
	}

	/// Number of threads in the install pool.
	pub fn install_threads(&self) -> usize {
		self.install_threads.unwrap_or_else(default_thread_count)
	}
	/// returns if the value was accepted, zero is not.
	pub fn set_install_threads(&mut self, threads: usize) -> bool {
		if threads == 0 {
			return false;
		}
		self.install_threads = Some(threads);
		true
	}

	pub fn download_retries(&self) -> u32 {
		self.download_retries
	}
	pub fn set_download_retries(&mut self, retries: u32) {
		self.download_retries = retries;
	}

	pub fn retry_backoff(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.retry_backoff_secs)
	}
	pub fn set_retry_backoff_secs(&mut self, secs: u64) {
		self.retry_backoff_secs = secs;
	}

	pub fn retry_threads(&self) -> usize {
		self.retry_threads
	}
	/// returns if the value was accepted, zero is not.
	pub fn set_retry_threads(&mut self, threads: usize) -> bool {
		if threads == 0 {
			return false;
		}
		self.retry_threads = threads;
		true
	}

	pub fn request_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.request_timeout_secs)
	}

	/// The 7-Zip executable used for formats the built in extractors don't handle.
	///
	/// Looks for a bundled `7zzs`/`7za.exe` next to the running executable before falling back to `7z` on `PATH`.
	pub fn sevenzip_command(&self) -> PathBuf {
		if let Some(cmd) = &self.sevenzip_command {
			return cmd.clone();
		}

		#[cfg(target_os = "windows")]
		const BUNDLED: &str = "7za.exe";
		#[cfg(not(target_os = "windows"))]
		const BUNDLED: &str = "7zzs";

		let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf));
		for dir in exe_dir.into_iter().chain(std::env::current_dir().ok()) {
			let candidate = dir.join(BUNDLED);
			if candidate.is_file() {
				return candidate;
			}
		}

		PathBuf::from("7z")
	}
	pub fn set_sevenzip_command(&mut self, command: Option<PathBuf>) {
		self.sevenzip_command = command;
	}

	/// External component sort program, when not set components keep manifest order.
	pub fn sorter_command(&self) -> Option<&str> {
		self.sorter_command.as_deref()
	}
	pub fn set_sorter_command(&mut self, command: Option<String>) {
		self.sorter_command = command;
	}

	pub fn profile(&self) -> &str {
		&self.profile
	}
	/// returns if the name is usable as a directory name.
	pub fn set_profile(&mut self, profile: String) -> bool {
		if profile.is_empty() || profile.contains(['/', '\\']) {
			return false;
		}
		self.profile = profile;
		true
	}
}

/// Host parallelism hint with a floor of [`MIN_WORKER_THREADS`].
pub fn default_thread_count() -> usize {
	std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(MIN_WORKER_THREADS)
		.max(MIN_WORKER_THREADS)
}

fn read_api_key_file(path: &Path) -> Option<String> {
	let key = std::fs::read_to_string(path).ok()?;
	let key = key.trim();
	if key.is_empty() {
		None
	} else {
		log::debug!("Read API key from {}", path.display());
		Some(key.to_string())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn thread_count_has_floor() { assert!(default_thread_count() >= MIN_WORKER_THREADS); }

	#[test]
	fn zero_threads_rejected() {
		let mut config = Config::default();
		assert!(!config.set_download_threads(0));
		assert!(config.set_download_threads(2));
		assert_eq!(config.download_threads(), 2);
	}

	#[test]
	fn blank_api_key_is_none() {
		let mut config = Config::default();
		config.set_api_key(Some("  \n".to_string()));
		assert_eq!(config.api_key(), None);
	}
}
