//! Copies extracted content into a package folder.
//!
//! The [`Materializer`] is the seam for installers that need option driven logic,
//! [`StandardMaterializer`] covers plain archives and packages whose manifest lists the files to install.

use std::path::{Path, PathBuf};

use super::content;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("copy failed: {0}")]
	FsExtra(#[from] fs_extra::error::Error),
	#[error("source tree is empty.")]
	EmptySource,
}

/// What the materializer needs to know about the package.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeRequest<'p> {
	pub package_name: &'p str,
	/// Option selections from the manifest.
	pub choices: Option<&'p serde_json::Value>,
	/// Relative paths the manifest says the package installs.
	pub expected_files: &'p [String],
}

/// Outcome of a successful materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
	/// Tree the files were taken from, a corrective copy reads from here.
	pub source: PathBuf,
	/// Number of regular files the destination should hold afterwards.
	/// `None` when only a selection of `source` was installed and counting would be meaningless.
	pub expected_files: Option<usize>,
}

pub trait Materializer: Send + Sync {
	/// Installs `source_tree` into `destination`.
	fn install(&self, source_tree: &Path, destination: &Path, request: &MaterializeRequest) -> Result<Materialized, MaterializeError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMaterializer;

impl StandardMaterializer {
	/// Copies only the files listed in `expected_files`.
	///
	/// Matching ignores case and accepts a listed path that is a suffix of the archive path,
	/// archives often carry an extra top level folder the manifest doesn't.
	///
	/// # Returns
	/// The number of files copied.
	fn install_expected(source_tree: &Path, destination: &Path, expected_files: &[String]) -> Result<usize, MaterializeError> {
		let wanted = expected_files.iter().map(|p| p.to_lowercase()).collect::<Vec<_>>();
		let mut copied = 0;

		for entry in walkdir::WalkDir::new(source_tree).into_iter().filter_map(|e| e.ok()) {
			if !entry.file_type().is_file() {
				continue;
			}
			let relative = match pathdiff::diff_paths(entry.path(), source_tree) {
				Some(r) => r,
				None => continue,
			};
			let relative_str = relative.to_string_lossy().replace('\\', "/").to_lowercase();

			let matched = wanted.iter().find(|w| relative_str == **w || relative_str.ends_with(&format!("/{}", w)));
			if let Some(matched) = matched {
				/* Install under the manifest's path, not the archive's */
				let original = expected_files.iter().find(|p| p.to_lowercase() == *matched).unwrap_or(matched);
				let target = destination.join(original);
				std::fs::create_dir_all(target.with_file_name(""))?;
				std::fs::copy(entry.path(), &target)?;
				copied += 1;
			}
		}

		Ok(copied)
	}
}

impl Materializer for StandardMaterializer {
	fn install(&self, source_tree: &Path, destination: &Path, request: &MaterializeRequest) -> Result<Materialized, MaterializeError> {
		std::fs::create_dir_all(destination)?;

		let has_installer = std::fs::read_dir(source_tree)?
			.filter_map(|e| e.ok())
			.any(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case("fomod"));

		if has_installer && request.choices.is_some() {
			log::warn!("Package {} has installer options, they are not applied by the standard materializer.", request.package_name);
		}

		if has_installer && !request.expected_files.is_empty() {
			let copied = Self::install_expected(source_tree, destination, request.expected_files)?;
			if copied > 0 {
				log::debug!("Installed {} of {} listed files for {}", copied, request.expected_files.len(), request.package_name);
				return Ok(Materialized { source: source_tree.to_path_buf(), expected_files: None });
			}
			log::warn!("None of the listed files of {} were found, installing the whole archive.", request.package_name);
		}

		let source = content::select_variant_folder(source_tree, request.package_name)?;
		let expected = content::count_files(&source);
		if expected == 0 {
			return Err(MaterializeError::EmptySource);
		}

		let options = fs_extra::dir::CopyOptions::new().overwrite(true).content_only(true);
		fs_extra::dir::copy(&source, destination, &options)?;

		Ok(Materialized { source, expected_files: Some(expected) })
	}
}
