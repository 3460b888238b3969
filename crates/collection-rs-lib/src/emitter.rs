//! Writes the priority lists the host reads.
//!
//! Both files are replaced as a whole on every run, top line is the highest priority.

use std::io::Write;
use std::path::{Path, PathBuf};

pub const PACKAGE_LIST: &str = "modlist.txt";
pub const COMPONENT_LIST: &str = "plugins.txt";

/// Prefix of an enabled package line.
pub const PACKAGE_MARKER: char = '+';
/// Prefix of an enabled component line.
pub const COMPONENT_MARKER: char = '*';

const GENERATED_BY: &str = concat!("# This file was automatically generated by collection-rs ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedLists {
	pub package_list: PathBuf,
	pub component_list: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Emitter {
	profile_dir: PathBuf,
}

impl Emitter {
	pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
		Self { profile_dir: profile_dir.into() }
	}

	/// Writes both lists.
	///
	/// # Parameters
	/// - `package_folders` - Package folder names, highest priority first.
	/// - `components` - Component names in load order.
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when the profile directory or a file can't be written.
	pub fn emit<P, C>(&self, package_folders: &[P], components: &[C]) -> crate::Result<EmittedLists>
	where P: AsRef<str>, C: AsRef<str>
	{
		std::fs::create_dir_all(&self.profile_dir)?;

		let mut packages = String::new();
		packages.push_str(GENERATED_BY);
		packages.push('\n');
		packages.push_str("# Mod priority: Top = Winner, Bottom = Loser\n");
		for folder in package_folders {
			packages.push(PACKAGE_MARKER);
			packages.push_str(folder.as_ref());
			packages.push('\n');
		}

		let mut plugins = String::new();
		plugins.push_str(GENERATED_BY);
		plugins.push('\n');
		for name in components {
			plugins.push(COMPONENT_MARKER);
			plugins.push_str(name.as_ref());
			plugins.push('\n');
		}

		let lists = EmittedLists {
			package_list: self.profile_dir.join(PACKAGE_LIST),
			component_list: self.profile_dir.join(COMPONENT_LIST),
		};
		replace_file(&lists.package_list, &packages)?;
		replace_file(&lists.component_list, &plugins)?;

		log::info!("Wrote {} packages to {} and {} components to {}",
			package_folders.len(), lists.package_list.display(), components.len(), lists.component_list.display());
		Ok(lists)
	}
}

/// Writes next to `path` then renames over it so readers never see half a file.
fn replace_file(path: &Path, content: &str) -> std::io::Result<()> {
	let temporary = path.with_extension("tmp");
	let mut file = std::fs::File::create(&temporary)?;
	file.write_all(content.as_bytes())?;
	file.sync_all()?;
	drop(file);
	std::fs::rename(&temporary, path)
}
