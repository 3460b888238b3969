//! External component order and the package positions derived from it.
//!
//! Components (plugin files) are sorted by an outside program, the order it returns is used as is.
//! A package's position is the earliest position of any component it installed.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::manifest::{ComponentEntry, Package};

/// Extensions of files counted as components, compared ignoring case.
pub const COMPONENT_EXTENSIONS: &[&str] = &["esp", "esm", "esl"];

#[derive(Debug, thiserror::Error)]
pub enum SortError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("sort command exited with {0}")]
	CommandFailed(String),
	#[error("sort command returned no components")]
	Empty,
}

/// Sorts component names.
pub trait ComponentSorter: Send + Sync {
	/// # Parameters
	/// - `installed_dirs` - Package folders the components live in.
	/// - `candidates` - Component names to sort.
	fn sort(&self, installed_dirs: &[PathBuf], candidates: &[String]) -> Result<Vec<String>, SortError>;
}

/// Keeps the order it was given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestOrderSorter;

impl ComponentSorter for ManifestOrderSorter {
	fn sort(&self, _installed_dirs: &[PathBuf], candidates: &[String]) -> Result<Vec<String>, SortError> {
		Ok(candidates.to_vec())
	}
}

/// Runs an external sort program.
///
/// The program gets `{"directories": [...], "components": [...]}` on stdin and prints the sorted
/// names, one per line.
#[derive(Debug, Clone)]
pub struct CommandSorter {
	program: String,
	args: Vec<String>,
}

impl CommandSorter {
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		Self { program: program.into(), args }
	}

	/// Splits a command line on whitespace, the first word is the program.
	pub fn from_command_line(command: &str) -> Option<Self> {
		let mut words = command.split_whitespace().map(str::to_string);
		let program = words.next()?;
		Some(Self::new(program, words.collect()))
	}
}

impl ComponentSorter for CommandSorter {
	fn sort(&self, installed_dirs: &[PathBuf], candidates: &[String]) -> Result<Vec<String>, SortError> {
		let request = serde_json::json!({
			"directories": installed_dirs,
			"components": candidates,
		});

		log::debug!("Running component sorter {}", self.program);
		let mut child = Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::inherit())
			.spawn()?;

		if let Some(mut stdin) = child.stdin.take() {
			let written = serde_json::to_writer(&mut stdin, &request)
				.map_err(std::io::Error::from)
				.and_then(|_| stdin.flush());
			/* A sorter that doesn't read its input may close the pipe first */
			match written {
				Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
				_ => {},
			}
		}

		let output = child.wait_with_output()?;
		if !output.status.success() {
			return Err(SortError::CommandFailed(output.status.to_string()));
		}

		let sorted = String::from_utf8_lossy(&output.stdout)
			.lines()
			.map(str::trim)
			.filter(|l| !l.is_empty())
			.map(str::to_string)
			.collect::<Vec<_>>();

		if sorted.is_empty() { Err(SortError::Empty) } else { Ok(sorted) }
	}
}

/// Names of the component files below `dir`, sorted.
pub fn find_components(dir: &Path) -> Vec<String> {
	let mut found = walkdir::WalkDir::new(dir)
		.into_iter()
		.filter_map(|e| e.ok())
		.filter(|e| e.file_type().is_file())
		.filter(|e| e.path()
			.extension()
			.map_or(false, |ext| COMPONENT_EXTENSIONS.iter().any(|c| ext.to_string_lossy().eq_ignore_ascii_case(c))))
		.map(|e| e.file_name().to_string_lossy().to_string())
		.collect::<Vec<_>>();
	found.sort();
	found
}

/// Builds package positions from installed output.
#[derive(Debug, Clone)]
pub struct PositionResolver {
	mods_dir: PathBuf,
	threads: usize,
}

impl PositionResolver {
	/// # Parameters
	/// - `mods_dir` - Directory holding the package folders.
	/// - `threads` - Folders scanned in parallel.
	pub fn new(mods_dir: impl Into<PathBuf>, threads: usize) -> Self {
		Self { mods_dir: mods_dir.into(), threads: threads.max(1) }
	}

	fn package_dirs(&self, packages: &[Package]) -> Vec<Option<PathBuf>> {
		packages.iter().map(|p| p.folder_name().map(|f| self.mods_dir.join(f))).collect()
	}

	/// Names to hand to the sorter.
	///
	/// The enabled components of the manifest, or when it lists none, the components found in the
	/// installed packages. Duplicates are dropped ignoring case.
	pub fn candidates(&self, components: &[ComponentEntry], packages: &[Package]) -> Vec<String> {
		let names: Vec<String> = if components.iter().any(|c| c.enabled) {
			components.iter().filter(|c| c.enabled).map(|c| c.name.clone()).collect()
		} else {
			self.package_dirs(packages).into_iter().flatten().flat_map(|d| find_components(&d)).collect()
		};

		let mut seen = HashSet::new();
		names.into_iter().filter(|n| seen.insert(n.to_lowercase())).collect()
	}

	/// Asks the sorter for the component order, falling back to `candidates` when it fails.
	pub fn component_order(&self, sorter: &dyn ComponentSorter, packages: &[Package], candidates: &[String]) -> Vec<String> {
		let dirs = self.package_dirs(packages).into_iter().flatten().filter(|d| d.is_dir()).collect::<Vec<_>>();
		match sorter.sort(&dirs, candidates) {
			Ok(order) => {
				log::info!("Sorted {} components", order.len());
				order
			},
			Err(e) => {
				log::warn!("Component sort failed ({}), keeping manifest order.", e);
				candidates.to_vec()
			},
		}
	}

	/// Position of each name, keyed in lower case. A repeated name keeps its first position.
	pub fn position_map(order: &[String]) -> HashMap<String, usize> {
		let mut map = HashMap::with_capacity(order.len());
		for (i, name) in order.iter().enumerate() {
			map.entry(name.to_lowercase()).or_insert(i);
		}
		map
	}

	/// Earliest position of any component below `dir`.
	pub fn package_position(dir: &Path, positions: &HashMap<String, usize>) -> Option<usize> {
		find_components(dir)
			.iter()
			.filter_map(|name| positions.get(&name.to_lowercase()).copied())
			.min()
	}

	/// Position of every package, `None` for packages without a known component.
	pub fn resolve(&self, packages: &[Package], positions: &HashMap<String, usize>) -> Vec<Option<usize>> {
		let dirs = self.package_dirs(packages);
		if dirs.is_empty() {
			return Vec::new();
		}

		let chunk = (dirs.len() + self.threads - 1) / self.threads;
		let resolved = std::thread::scope(|scope| {
			let handles = dirs
				.chunks(chunk)
				.map(|part| (part.len(), scope.spawn(move || {
					part.iter()
						.map(|d| d.as_deref().and_then(|d| Self::package_position(d, positions)))
						.collect::<Vec<_>>()
				})))
				.collect::<Vec<_>>();

			handles
				.into_iter()
				.flat_map(|(len, h)| h.join().unwrap_or_else(|_| {
					log::error!("Position scan thread panicked");
					vec![None; len]
				}))
				.collect::<Vec<_>>()
		});

		let matched = resolved.iter().filter(|p| p.is_some()).count();
		log::info!("{} of {} packages matched an external component position", matched, packages.len());
		resolved
	}
}
