use serde_json::Value;

use super::{array_at, int_at, string_at, value_at};

/// Where a package's archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
	/// Hosted by the remote catalog, links are requested with the id pair.
	Remote { mod_id: i64, file_id: i64 },
	/// Plain URL.
	Direct { url: String },
	/// Nothing usable, the package is skipped with a warning.
	None,
}

/// A downloadable add-on listed in a manifest.
#[derive(Debug, Clone)]
pub struct Package {
	/// Position in the manifest, used as the package id everywhere else.
	pub index: usize,
	pub name: String,
	/// MD5 of the archive as listed by the manifest, may be empty.
	pub content_hash: String,
	/// Logical file name, may be empty.
	pub logical_filename: String,
	/// Archive size in bytes, zero when unknown.
	pub size: u64,
	pub source: PackageSource,
	/// Option selections for packages with an installer, passed through to the materializer untouched.
	pub choices: Option<Value>,
	/// Relative paths the package should install, `/` separated.
	pub expected_files: Vec<String>,
	folder_name: Option<String>,
}

impl Package {
	pub fn new(index: usize, name: impl Into<String>, source: PackageSource) -> Self {
		Self {
			index,
			name: name.into(),
			content_hash: String::new(),
			logical_filename: String::new(),
			size: 0,
			source,
			choices: None,
			expected_files: Vec::new(),
			folder_name: None,
		}
	}

	pub(crate) fn from_manifest_entry(index: usize, entry: &Value) -> Self {
		let source = match string_at(entry, &["source", "type"]).as_str() {
			"direct" | "browse" => {
				let url = string_at(entry, &["source", "url"]);
				if url.is_empty() { PackageSource::None } else { PackageSource::Direct { url } }
			},
			_ => {
				let mod_id = int_at(entry, &["source", "modId"]);
				let file_id = int_at(entry, &["source", "fileId"]);
				let url = string_at(entry, &["source", "url"]);
				if mod_id > 0 && file_id > 0 {
					PackageSource::Remote { mod_id, file_id }
				} else if !url.is_empty() {
					PackageSource::Direct { url }
				} else {
					PackageSource::None
				}
			},
		};

		let expected_files = array_at(entry, &["hashes"])
			.iter()
			.map(|h| string_at(h, &["path"]).replace('\\', "/"))
			.filter(|p| !p.is_empty())
			.collect();

		Self {
			index,
			name: string_at(entry, &["name"]),
			content_hash: string_at(entry, &["source", "md5"]).to_lowercase(),
			logical_filename: string_at(entry, &["source", "logicalFilename"]),
			size: int_at(entry, &["source", "fileSize"]).max(0) as u64,
			source,
			choices: value_at(entry, &["choices"]).cloned(),
			expected_files,
			folder_name: None,
		}
	}

	/// Key used when resolving rule endpoints by file name.
	/// Falls back to the display name when the manifest gives no logical file name.
	pub fn logical_key(&self) -> &str {
		if self.logical_filename.is_empty() { &self.name } else { &self.logical_filename }
	}

	/// Key the host instance remembers folder names by.
	pub fn identity_key(&self) -> String {
		if !self.content_hash.is_empty() {
			format!("md5:{}", self.content_hash)
		} else {
			format!("name:{}", self.logical_key())
		}
	}

	/// Name of the folder the package is installed into, set by [`crate::HostInstance::assign_folder_names`].
	pub fn folder_name(&self) -> Option<&str> {
		self.folder_name.as_deref()
	}

	/// Sets the folder name.
	///
	/// Returns `false` and leaves the package untouched when a name is already set.
	pub fn assign_folder_name(&mut self, folder_name: impl Into<String>) -> bool {
		if self.folder_name.is_some() {
			return false;
		}
		self.folder_name = Some(folder_name.into());
		true
	}

	/// Folder name the package would get on a fresh host.
	pub fn default_folder_name(&self) -> String {
		match &self.source {
			PackageSource::Remote { mod_id, file_id } => {
				format!("{}-{}-{}", sanitize_folder_name(self.logical_key()), mod_id, file_id)
			},
			_ => sanitize_folder_name(&self.name),
		}
	}
}

impl std::fmt::Display for Package {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{} {}", self.index, self.name)
	}
}

/// Replaces characters that aren't valid in Windows file names and trims trailing spaces and dots.
pub fn sanitize_folder_name(name: &str) -> String {
	let replaced: String = name
		.chars()
		.map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
		.collect();
	let trimmed = replaced.trim_end_matches([' ', '.']);
	if trimmed.is_empty() { "_".to_string() } else { trimmed.to_string() }
}
