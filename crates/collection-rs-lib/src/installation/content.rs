//! Layout handling for extracted package content.
//!
//! Archives are packed in all sorts of ways, these helpers find the directory that holds the
//! actual content so it ends up at the root of the package folder.

use std::path::{Path, PathBuf};

/// Top level folders the host reads directly, a tree starting with one of these is never unwrapped.
const DATA_FOLDERS: &[&str] = &[
	"meshes", "textures", "scripts", "sound", "interface", "strings", "seq", "grass",
	"video", "music", "shaders", "shadersfx", "lodsettings", "skse", "netscriptframework",
	"edit scripts", "dialogueviews", "facegen", "caliente tools", "actors", "fonts",
	"materials", "platform", "source", "terrain", "trees", "vis", "distantlod", "lod",
	"dyndolod", "nemesis_engine",
];

const IGNORABLE_EXTENSIONS: &[&str] = &[
	"txt", "md", "pdf", "doc", "docx", "rtf", "url", "ini", "png", "jpg", "jpeg", "bmp", "gif",
];

const IGNORABLE_NAME_PARTS: &[&str] = &[
	"readme", "license", "changelog", "credits", "authors", "install", "instructions",
];

/// Folder the game itself would call `Data`, its content belongs at the package root.
pub fn is_game_data_folder(name: &str) -> bool {
	name.eq_ignore_ascii_case("data")
}

pub fn is_data_folder(name: &str) -> bool {
	DATA_FOLDERS.iter().any(|d| d.eq_ignore_ascii_case(name))
}

/// Files that sit next to the real content without being part of it (readmes, screenshots...).
pub fn is_ignorable_file(name: &str) -> bool {
	let lower = name.to_lowercase();
	let ignorable_extension = Path::new(&lower)
		.extension()
		.map_or(false, |e| IGNORABLE_EXTENSIONS.iter().any(|x| e == *x));
	ignorable_extension || IGNORABLE_NAME_PARTS.iter().any(|p| lower.contains(p))
}

struct Listing {
	dirs: Vec<PathBuf>,
	significant_files: usize,
}

fn list(dir: &Path) -> std::io::Result<Listing> {
	let mut dirs = Vec::new();
	let mut significant_files = 0;
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		let file_type = entry.file_type()?;
		if file_type.is_dir() {
			dirs.push(entry.path());
		} else if !is_ignorable_file(&entry.file_name().to_string_lossy()) {
			significant_files += 1;
		}
	}
	dirs.sort();
	Ok(Listing { dirs, significant_files })
}

fn dir_name(path: &Path) -> String {
	path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

/// Descends through wrapper directories.
///
/// A directory is a wrapper when it holds exactly one subdirectory and nothing but ignorable
/// files next to it. Descent stops at a known data folder, a `Data` folder is always entered.
pub fn find_content_root(extracted: &Path) -> std::io::Result<PathBuf> {
	let mut current = extracted.to_path_buf();
	loop {
		let listing = list(&current)?;
		if listing.significant_files > 0 || listing.dirs.len() != 1 {
			return Ok(current);
		}

		let only = &listing.dirs[0];
		let name = dir_name(only);
		if is_data_folder(&name) {
			return Ok(current);
		}

		log::trace!("Descending into wrapper directory \"{}\"", name);
		current = only.clone();
	}
}

/// Picks the variant matching the package name when a tree is only a set of variant folders.
///
/// Returns `root` when the tree has files of its own, fewer than two folders, a data folder,
/// or no folder named like the package.
pub fn select_variant_folder(root: &Path, package_name: &str) -> std::io::Result<PathBuf> {
	let listing = list(root)?;
	if listing.significant_files > 0 || listing.dirs.len() < 2 {
		return Ok(root.to_path_buf());
	}
	if listing.dirs.iter().any(|d| { let n = dir_name(d); is_data_folder(&n) || is_game_data_folder(&n) }) {
		return Ok(root.to_path_buf());
	}

	match listing.dirs.iter().find(|d| dir_name(d).eq_ignore_ascii_case(package_name.trim())) {
		Some(variant) => {
			log::debug!("Selected variant folder \"{}\"", dir_name(variant));
			Ok(variant.clone())
		},
		None => Ok(root.to_path_buf()),
	}
}

/// Moves files whose name contains a backslash into the directories the name describes.
///
/// Archives made on Windows sometimes store `a\b\c.dds` as a single file name.
///
/// # Returns
/// Number of files moved.
pub fn fix_backslash_paths(root: &Path) -> std::io::Result<usize> {
	let misplaced = walkdir::WalkDir::new(root)
		.into_iter()
		.filter_map(|e| e.ok())
		.filter(|e| e.file_type().is_file() && e.file_name().to_string_lossy().contains('\\'))
		.map(|e| e.into_path())
		.collect::<Vec<_>>();

	for path in &misplaced {
		let parent = path.parent().unwrap_or(root);
		let name = dir_name(path);
		let target = name
			.split('\\')
			.filter(|s| !s.is_empty())
			.fold(parent.to_path_buf(), |p, s| p.join(s));
		std::fs::create_dir_all(target.with_file_name(""))?;
		std::fs::rename(path, &target)?;
	}

	if !misplaced.is_empty() {
		log::debug!("Moved {} files with backslash names under {}", misplaced.len(), root.display());
	}
	Ok(misplaced.len())
}

/// Number of regular files below `dir`, zero when it doesn't exist.
pub fn count_files(dir: &Path) -> usize {
	if !dir.exists() {
		return 0;
	}
	walkdir::WalkDir::new(dir)
		.into_iter()
		.filter_map(|e| e.ok())
		.filter(|e| e.file_type().is_file())
		.count()
}

/// Copies `source` into `destination` one file at a time.
///
/// # Returns
/// Number of files copied.
pub fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<usize> {
	let mut copied = 0;
	for entry in walkdir::WalkDir::new(source) {
		let entry = entry?;
		let relative = match pathdiff::diff_paths(entry.path(), source) {
			Some(r) => r,
			None => continue,
		};
		let target = destination.join(relative);

		if entry.file_type().is_dir() {
			std::fs::create_dir_all(&target)?;
		} else if entry.file_type().is_file() {
			std::fs::create_dir_all(target.with_file_name(""))?;
			std::fs::copy(entry.path(), &target)?;
			copied += 1;
		}
	}
	Ok(copied)
}

/// Existing child of `dir` matching `name` ignoring case, or `dir/name`.
fn child_ignoring_case(dir: &Path, name: &std::ffi::OsStr) -> std::io::Result<PathBuf> {
	let wanted = name.to_string_lossy().to_lowercase();
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		if entry.file_name().to_string_lossy().to_lowercase() == wanted {
			return Ok(entry.path());
		}
	}
	Ok(dir.join(name))
}

/// Moves the content of `source` into `destination`, merging directories that differ only in case.
fn merge_move(source: &Path, destination: &Path) -> std::io::Result<()> {
	std::fs::create_dir_all(destination)?;
	for entry in std::fs::read_dir(source)? {
		let entry = entry?;
		let target = child_ignoring_case(destination, &entry.file_name())?;
		if entry.file_type()?.is_dir() && target.is_dir() {
			merge_move(&entry.path(), &target)?;
			std::fs::remove_dir(entry.path())?;
		} else {
			if target.is_file() {
				std::fs::remove_file(&target)?;
			}
			std::fs::rename(entry.path(), &target)?;
		}
	}
	Ok(())
}

/// Moves the content of a top level `Data` folder in `dir` up into `dir`.
///
/// # Returns
/// If a `Data` folder was found.
pub fn flatten_data_folder(dir: &Path) -> std::io::Result<bool> {
	let data = std::fs::read_dir(dir)?
		.filter_map(|e| e.ok())
		.find(|e| e.file_type().map_or(false, |t| t.is_dir()) && is_game_data_folder(&e.file_name().to_string_lossy()))
		.map(|e| e.path());

	let data = match data {
		Some(d) => d,
		None => return Ok(false),
	};

	/* Move out of the way first so a child called `data` can't collide with the folder itself */
	let staging = dir.join(".data-flatten");
	std::fs::rename(&data, &staging)?;
	merge_move(&staging, dir)?;
	std::fs::remove_dir(&staging)?;

	log::debug!("Flattened Data folder in {}", dir.display());
	Ok(true)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn ignorable_files() {
		assert!(is_ignorable_file("README"));
		assert!(is_ignorable_file("screenshot.PNG"));
		assert!(is_ignorable_file("Install Notes.rtf"));
		assert!(!is_ignorable_file("plugin.esp"));
	}

	#[test]
	fn data_folders() {
		assert!(is_data_folder("Textures"));
		assert!(is_data_folder("SKSE"));
		assert!(!is_data_folder("Data"));
		assert!(is_game_data_folder("Data"));
	}
}
