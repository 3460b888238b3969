//! Downloads a package's archive.
//!
//! Network access goes through two traits so the pipeline can be driven without a network:
//! [`Transfer`] moves bytes from a URL to a file and [`Catalog`] turns a remote id pair into URLs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::manifest::{sanitize_folder_name, Package, PackageSource};

const USER_AGENT: &str = concat!("collection-rs/", env!("CARGO_PKG_VERSION"));
const CATALOG_URL: &str = "https://api.nexusmods.com/v1";

/// Errors that can occur during the download process.
#[derive(Debug, Error)]
pub enum DownloadError {
	/// Package has neither a remote id pair nor a URL.
	#[error("package does not have a download source.")]
	MissingSource,
	/// Remote packages need a catalog to resolve links.
	#[error("no catalog available to resolve remote package.")]
	NoCatalog,
	#[error("request timed out: {0}")]
	Timeout(String),
	#[error("connection failed: {0}")]
	Connect(String),
	#[error("host could not be resolved: {0}")]
	Resolve(String),
	#[error("remote sent an empty response.")]
	EmptyResponse,
	/// The remote answered with an error status.
	#[error("remote rejected the request with status {0}.")]
	Rejected(u16),
	#[error("catalog returned no download links.")]
	NoLinks,
	#[error("reqwest error: {0}")]
	Reqwest(reqwest::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
}

impl DownloadError {
	/// Transient errors are worth retrying after a pause, anything else is final.
	pub fn is_transient(&self) -> bool {
		matches!(self,
			DownloadError::Timeout(_) |
			DownloadError::Connect(_) |
			DownloadError::Resolve(_) |
			DownloadError::EmptyResponse
		)
	}
}

impl From<reqwest::Error> for DownloadError {
	fn from(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			DownloadError::Timeout(e.to_string())
		} else if e.is_connect() {
			/* reqwest reports DNS failures as connect errors, the resolver message is in the source chain */
			let mut source: Option<&dyn std::error::Error> = Some(&e);
			while let Some(s) = source {
				let msg = s.to_string().to_lowercase();
				if msg.contains("dns") || msg.contains("lookup address") {
					return DownloadError::Resolve(e.to_string());
				}
				source = s.source();
			}
			DownloadError::Connect(e.to_string())
		} else if let Some(status) = e.status() {
			DownloadError::Rejected(status.as_u16())
		} else {
			DownloadError::Reqwest(e)
		}
	}
}

/// Moves the bytes at a URL into a file.
pub trait Transfer: Send + Sync {
	/// # Parameters
	/// - `url` - Location of the content.
	/// - `auth_token` - Sent with the request when present.
	/// - `destination` - File to create, removed again on failure.
	/// # Returns
	/// The number of bytes written.
	fn fetch(&self, url: &str, auth_token: Option<&str>, destination: &Path) -> Result<u64, DownloadError>;
}

/// Resolves a remote id pair to download URLs.
pub trait Catalog: Send + Sync {
	fn download_links(&self, mod_id: i64, file_id: i64) -> Result<Vec<String>, DownloadError>;
}

fn build_client(config: &crate::Config) -> crate::Result<reqwest::blocking::Client> {
	Ok(reqwest::blocking::Client::builder()
		.https_only(config.https_only())
		.user_agent(USER_AGENT)
		.timeout(config.request_timeout())
		.connect_timeout(Duration::from_secs(30))
		.build()?)
}

/// [`Transfer`] over HTTP(S), the token is sent as the `apikey` header.
#[derive(Debug, Clone)]
pub struct HttpTransfer {
	client: reqwest::blocking::Client,
}

impl HttpTransfer {
	/// # Errors
	/// - [`Reqwest`](crate::error::Error::Reqwest) when the client can't be built.
	pub fn new(config: &crate::Config) -> crate::Result<Self> {
		Ok(Self { client: build_client(config)? })
	}
}

impl Transfer for HttpTransfer {
	fn fetch(&self, url: &str, auth_token: Option<&str>, destination: &Path) -> Result<u64, DownloadError> {
		let url = encode_url_spaces(url);
		log::trace!("GET {}", url);

		let mut request = self.client.get(&url);
		if let Some(token) = auth_token {
			request = request.header("apikey", token);
		}

		let mut response = request.send()?;
		if !response.status().is_success() {
			return Err(DownloadError::Rejected(response.status().as_u16()));
		}

		let written = (|| -> Result<u64, DownloadError> {
			let mut file = std::io::BufWriter::new(std::fs::File::create(destination)?);
			let written = response.copy_to(&mut file)?;
			std::io::Write::flush(&mut file)?;
			Ok(written)
		})();

		match written {
			Ok(0) => {
				let _ = std::fs::remove_file(destination);
				Err(DownloadError::EmptyResponse)
			},
			Ok(n) => Ok(n),
			Err(e) => {
				let _ = std::fs::remove_file(destination);
				Err(e)
			},
		}
	}
}

/// [`Catalog`] backed by the Nexus Mods v1 API.
#[derive(Debug, Clone)]
pub struct NexusCatalog {
	client: reqwest::blocking::Client,
	domain: String,
	api_key: Option<String>,
}

impl NexusCatalog {
	/// # Parameters
	/// - `domain` - Game domain from the manifest.
	/// # Errors
	/// - [`Reqwest`](crate::error::Error::Reqwest) when the client can't be built.
	pub fn new(config: &crate::Config, domain: impl Into<String>) -> crate::Result<Self> {
		Ok(Self {
			client: build_client(config)?,
			domain: domain.into(),
			api_key: config.api_key().map(str::to_string),
		})
	}
}

impl Catalog for NexusCatalog {
	fn download_links(&self, mod_id: i64, file_id: i64) -> Result<Vec<String>, DownloadError> {
		let url = format!("{}/games/{}/mods/{}/files/{}/download_link.json", CATALOG_URL, self.domain, mod_id, file_id);
		let mut request = self.client.get(&url);
		if let Some(key) = &self.api_key {
			request = request.header("apikey", key);
		}

		let response = request.send()?;
		if !response.status().is_success() {
			/* 403 means the account can't generate links for this file */
			return Err(DownloadError::Rejected(response.status().as_u16()));
		}

		let body: serde_json::Value = serde_json::from_slice(&response.bytes()?).unwrap_or_default();
		let links = body
			.as_array()
			.map(|items| items.iter().filter_map(|i| i.get("URI")?.as_str().map(str::to_string)).collect::<Vec<_>>())
			.unwrap_or_default();

		if links.is_empty() {
			Err(DownloadError::NoLinks)
		} else {
			Ok(links)
		}
	}
}

/// How failed downloads are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Retry passes after the first attempt.
	pub max_retries: u32,
	/// Pause before each retry pass.
	pub backoff: Duration,
	/// Worker count for retry passes.
	pub retry_threads: usize,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 3, backoff: Duration::from_secs(2), retry_threads: 4 }
	}
}

impl RetryPolicy {
	pub fn from_config(config: &crate::Config) -> Self {
		Self {
			max_retries: config.download_retries(),
			backoff: config.retry_backoff(),
			retry_threads: config.retry_threads(),
		}
	}

	/// Upper bound on how often a single download is attempted.
	pub fn max_attempts(&self) -> u32 {
		self.max_retries + 1
	}
}

/// Encodes spaces in the path part of a URL, the query is left alone.
pub fn encode_url_spaces(url: &str) -> String {
	match url.split_once('?') {
		Some((path, query)) => format!("{}?{}", path.replace(' ', "%20"), query),
		None => url.replace(' ', "%20"),
	}
}

/// Last path segment of a URL, without the query.
fn url_file_name(url: &str) -> Option<String> {
	let path = url.split(['?', '#']).next().unwrap_or(url);
	let name = path.rsplit('/').next()?;
	let name = name.replace("%20", " ");
	(!name.is_empty() && !name.contains(':')).then_some(name)
}

/// Where a package's archive is stored in the downloads directory.
///
/// Direct downloads keep the URL's file name, remote ones are named after the logical file
/// name and id pair so [`find_existing_archive`] can recognise them later.
pub fn archive_path(downloads_dir: &Path, package: &Package, url: Option<&str>) -> PathBuf {
	let from_url = url.and_then(url_file_name);
	let name = match &package.source {
		PackageSource::Remote { mod_id, file_id } => {
			let extension = from_url
				.as_deref()
				.and_then(|n| Path::new(n).extension())
				.map(|e| e.to_string_lossy().to_lowercase())
				.unwrap_or_else(|| "7z".to_string());
			format!("{}-{}-{}.{}", sanitize_folder_name(package.logical_key()), mod_id, file_id, extension)
		},
		_ => match from_url {
			Some(n) => sanitize_folder_name(&n),
			None => sanitize_folder_name(&package.name) + ".7z",
		},
	};
	downloads_dir.join(name)
}

/// Looks for an archive of the package that is already in the downloads directory.
///
/// Direct packages match on the exact file name. Remote packages match a file carrying their
/// mod and file id pair, preferring one named after the logical file name. A file that only
/// shares the mod id is used when its size matches the manifest, other files of the same mod
/// are never picked up.
pub fn find_existing_archive(downloads_dir: &Path, package: &Package) -> Option<PathBuf> {
	let (mod_id, file_id) = match &package.source {
		PackageSource::Remote { mod_id, file_id } => (*mod_id, *file_id),
		PackageSource::Direct { url } => {
			let path = archive_path(downloads_dir, package, Some(url));
			return (file_size(&path) > 0).then_some(path);
		},
		PackageSource::None => return None,
	};

	let mut files = std::fs::read_dir(downloads_dir)
		.ok()?
		.filter_map(|e| e.ok())
		.map(|e| e.path())
		.filter(|p| p.is_file() && file_size(p) > 0)
		.filter(|p| p.extension().map_or(true, |e| e != "part"))
		.collect::<Vec<_>>();
	files.sort();

	let logical = sanitize_folder_name(package.logical_key()).to_lowercase();
	let mut names = vec![logical.clone()];
	if let Some(short) = logical.strip_prefix("creation club - ") {
		names.push(short.to_string());
	}
	let named = |p: &&PathBuf, marker: &str| {
		let name = lower_file_name(p);
		names.iter().any(|n| name.starts_with(&format!("{}{}", n, marker)))
	};

	let pair_marker = format!("-{}-{}.", mod_id, file_id);
	let by_pair = files.iter().filter(|p| lower_file_name(p).contains(&pair_marker)).collect::<Vec<_>>();
	if let Some(found) = by_pair.iter().find(|p| named(*p, &pair_marker)).or_else(|| by_pair.first()) {
		return Some(found.to_path_buf());
	}

	if package.size == 0 {
		return None;
	}
	let id_marker = format!("-{}-", mod_id);
	let by_size = files
		.iter()
		.filter(|p| lower_file_name(p).contains(&id_marker) && file_size(p) == package.size)
		.collect::<Vec<_>>();
	by_size
		.iter()
		.find(|p| named(*p, &id_marker))
		.or_else(|| by_size.first())
		.map(|p| p.to_path_buf())
}

fn lower_file_name(path: &Path) -> String {
	path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default()
}

fn file_size(path: &Path) -> u64 {
	std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Downloads a single package's archive.
///
/// # Parameters
/// - `downloads_dir` - Directory archives are saved to.
/// - `transfer` - Moves the bytes.
/// - `catalog` - Resolves remote packages, may be `None` when only direct packages are expected.
/// - `auth_token` - Forwarded to the transfer.
/// # Returns
/// The archive's path.
/// # Errors
/// Anything [`DownloadError`] covers, use [`DownloadError::is_transient`] to decide on a retry.
pub fn download_package(
	package: &Package,
	downloads_dir: &Path,
	transfer: &dyn Transfer,
	catalog: Option<&dyn Catalog>,
	auth_token: Option<&str>,
) -> Result<PathBuf, DownloadError> {
	let url = match &package.source {
		PackageSource::Direct { url } => url.clone(),
		PackageSource::Remote { mod_id, file_id } => {
			let catalog = catalog.ok_or(DownloadError::NoCatalog)?;
			catalog.download_links(*mod_id, *file_id)?
				.into_iter()
				.next()
				.ok_or(DownloadError::NoLinks)?
		},
		PackageSource::None => return Err(DownloadError::MissingSource),
	};

	let destination = archive_path(downloads_dir, package, Some(&url));
	if file_size(&destination) > 0 {
		log::info!("Package {} already downloaded, skipping.", package);
		return Ok(destination);
	}

	std::fs::create_dir_all(downloads_dir)?;
	let mut partial = destination.clone().into_os_string();
	partial.push(".part");
	let partial = PathBuf::from(partial);

	log::info!("Downloading package {} from {}", package, url);
	let written = transfer.fetch(&url, auth_token, &partial)?;
	std::fs::rename(&partial, &destination)?;

	if package.size > 0 && written != package.size {
		log::warn!("Package {} size mismatch, expected {} bytes got {}", package, package.size, written);
	}

	Ok(destination)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn transient_classification() {
		assert!(DownloadError::EmptyResponse.is_transient());
		assert!(DownloadError::Timeout("t".into()).is_transient());
		assert!(!DownloadError::Rejected(403).is_transient());
		assert!(!DownloadError::MissingSource.is_transient());
	}

	#[test]
	fn spaces_encoded_in_path_only() {
		assert_eq!(encode_url_spaces("https://a.b/my file.7z?x=a b"), "https://a.b/my%20file.7z?x=a b");
	}

	#[test]
	fn direct_archive_named_from_url() {
		let p = Package::new(0, "Thing", PackageSource::Direct { url: "https://host/files/thing%20v2.zip?token=1".into() });
		assert_eq!(archive_path(Path::new("/d"), &p, Some("https://host/files/thing%20v2.zip?token=1")), Path::new("/d/thing v2.zip"));
	}

	#[test]
	fn remote_archive_named_from_ids() {
		let p = Package::new(0, "Thing", PackageSource::Remote { mod_id: 5, file_id: 9 });
		assert_eq!(archive_path(Path::new("/d"), &p, Some("https://cdn/x/Thing.zip")), Path::new("/d/Thing-5-9.zip"));
		assert_eq!(archive_path(Path::new("/d"), &p, None), Path::new("/d/Thing-5-9.7z"));
	}

	#[test]
	fn existing_archive_matches_file_id() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("Main-5-9.zip"), b"main").unwrap();

		let main = Package::new(0, "Main", PackageSource::Remote { mod_id: 5, file_id: 9 });
		let mut patch = Package::new(1, "Patch", PackageSource::Remote { mod_id: 5, file_id: 10 });
		assert_eq!(find_existing_archive(dir.path(), &main), Some(dir.path().join("Main-5-9.zip")));
		assert_eq!(find_existing_archive(dir.path(), &patch), None);

		/* Sharing only the mod id needs the manifest size to agree */
		patch.size = 5;
		assert_eq!(find_existing_archive(dir.path(), &patch), None);
		patch.size = 4;
		assert_eq!(find_existing_archive(dir.path(), &patch), Some(dir.path().join("Main-5-9.zip")));
	}

	#[test]
	fn existing_archive_found_for_unsafe_logical_name() {
		let dir = tempfile::tempdir().unwrap();
		let mut p = Package::new(0, "Weather", PackageSource::Remote { mod_id: 42, file_id: 1 });
		p.logical_filename = "Weather: Mod".to_string();
		std::fs::write(dir.path().join("Other-42-1.7z"), b"other").unwrap();
		let own = archive_path(dir.path(), &p, None);
		std::fs::write(&own, b"own").unwrap();

		assert_eq!(own, dir.path().join("Weather_ Mod-42-1.7z"));
		assert_eq!(find_existing_archive(dir.path(), &p), Some(own));
	}
}
