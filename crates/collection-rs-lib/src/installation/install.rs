//! Installs a downloaded archive into its package folder.

use std::path::{Path, PathBuf};

use super::content;
use super::extract::{ExtractError, Extractor};
use super::materialize::{MaterializeError, MaterializeRequest, Materializer};

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("extraction failed: {0}")]
	Extract(#[from] ExtractError),
	#[error("materializer failed: {0}")]
	Materialize(#[from] MaterializeError),
	#[error("archive {0} not found.")]
	MissingArchive(PathBuf),
}

/// Everything an install task needs, built by the coordinator.
#[derive(Debug, Clone)]
pub struct InstallJob {
	pub package_index: usize,
	pub package_name: String,
	pub archive: PathBuf,
	pub destination: PathBuf,
	/// Private scratch directory, removed when the task ends.
	pub scratch: PathBuf,
	pub choices: Option<serde_json::Value>,
	pub expected_files: Vec<String>,
}

/// Result of a successful install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
	/// Regular files in the package folder.
	pub installed_files: usize,
	/// Files the materializer said should be there, `None` when it didn't say.
	pub expected_files: Option<usize>,
	/// Times the folder was rebuilt with an explicit copy after an undercount.
	pub corrective_copies: usize,
	/// Set when the folder still held fewer files than expected after the corrective copy.
	pub shortfall: Option<usize>,
}

impl InstallReport {
	pub fn warnings(&self) -> usize {
		usize::from(self.shortfall.is_some())
	}
}

/// Removes the scratch directory however the task ends.
struct ScratchGuard<'p>(&'p Path);

impl Drop for ScratchGuard<'_> {
	fn drop(&mut self) {
		if self.0.exists() {
			if let Err(e) = std::fs::remove_dir_all(self.0) {
				log::warn!("Failed to remove scratch directory {}: {}", self.0.display(), e);
			}
		}
	}
}

fn clear_dir(dir: &Path) -> std::io::Result<()> {
	if dir.exists() {
		std::fs::remove_dir_all(dir)?;
	}
	std::fs::create_dir_all(dir)
}

/// Runs an install task.
///
/// Extracts into the scratch directory, finds the content root below any wrapper directories,
/// hands it to the materializer and checks the package folder holds as many files as expected.
/// An undercount rebuilds the folder once with an explicit copy, a remaining undercount is
/// recorded as a warning in the report and doesn't fail the install.
///
/// # Errors
/// Extraction and materializer failures and IO errors on the package folder.
/// A failed install leaves no package folder behind.
pub fn install_package(job: &InstallJob, extractor: &dyn Extractor, materializer: &dyn Materializer) -> Result<InstallReport, InstallError> {
	let result = run_install(job, extractor, materializer);
	if result.is_err() && job.destination.exists() {
		if let Err(e) = std::fs::remove_dir_all(&job.destination) {
			log::warn!("Failed to remove partial install at {}: {}", job.destination.display(), e);
		}
	}
	result
}

fn run_install(job: &InstallJob, extractor: &dyn Extractor, materializer: &dyn Materializer) -> Result<InstallReport, InstallError> {
	if !job.archive.is_file() {
		return Err(InstallError::MissingArchive(job.archive.clone()));
	}

	clear_dir(&job.scratch)?;
	let _guard = ScratchGuard(&job.scratch);

	log::info!("Installing {} from {}", job.package_name, job.archive.display());
	extractor.extract(&job.archive, &job.scratch)?;
	content::fix_backslash_paths(&job.scratch)?;

	let content_root = content::find_content_root(&job.scratch)?;
	log::trace!("Content root of {} is {}", job.package_name, content_root.display());

	let request = MaterializeRequest {
		package_name: &job.package_name,
		choices: job.choices.as_ref(),
		expected_files: &job.expected_files,
	};
	let materialized = materializer.install(&content_root, &job.destination, &request)?;

	let mut report = InstallReport {
		installed_files: content::count_files(&job.destination),
		expected_files: materialized.expected_files,
		..Default::default()
	};

	if let Some(expected) = materialized.expected_files {
		if report.installed_files < expected {
			log::info!("{} holds {} of {} files, retrying with an explicit copy.", job.package_name, report.installed_files, expected);
			clear_dir(&job.destination)?;
			content::copy_tree(&materialized.source, &job.destination)?;
			report.corrective_copies += 1;
			report.installed_files = content::count_files(&job.destination);

			if report.installed_files < expected {
				let missing = expected - report.installed_files;
				log::warn!("{} is missing {} of {} files after the corrective copy.", job.package_name, missing, expected);
				report.shortfall = Some(missing);
			}
		}
	}

	content::flatten_data_folder(&job.destination)?;

	log::info!("Installed {} ({} files)", job.package_name, report.installed_files);
	Ok(report)
}
