//! Host application directory tree.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::manifest::Package;

/// The managed directory tree of a host application.
///
/// Holds the folder map, the folder name each package identity was installed under.
/// The map is saved with bincode so a package keeps its folder between runs,
/// it is not saved automatically, call [`save_to_disk()`](HostInstance::save_to_disk()) after assigning names.
#[derive(Debug)]
pub struct HostInstance {
	root: PathBuf,
	profile: String,
	folder_map: HashMap<String, String>,
}

impl HostInstance {
	/// Opens the host tree at `root`, creating the managed directories when missing.
	///
	/// # Parameters
	/// - `root` - Base directory of the host application.
	/// - `profile` - Profile the output lists are written to.
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when creating directories or reading the folder map.
	/// - [`Bincode`](crate::error::Error::Bincode) when the folder map is unreadable.
	pub fn new(root: impl AsRef<Path>, profile: impl Into<String>) -> crate::Result<Self> {
		let mut instance = HostInstance {
			root: root.as_ref().to_path_buf(),
			profile: profile.into(),
			folder_map: Default::default(),
		};

		for dir in [instance.mods_dir(), instance.downloads_dir(), instance.profile_dir(), instance.scratch_dir()] {
			std::fs::create_dir_all(dir)?;
		}

		let map_path = instance.folder_map_path();
		if map_path.exists() {
			let file = std::fs::File::open(&map_path)?;
			instance.folder_map = bincode::deserialize_from(file)?;
			log::debug!("Loaded {} folder mappings from {}", instance.folder_map.len(), map_path.display());
		}

		log::info!("Opened host instance at {}", instance.root.display());
		Ok(instance)
	}

	/* Fields */

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn mods_dir(&self) -> PathBuf {
		self.root.join("mods")
	}

	pub fn downloads_dir(&self) -> PathBuf {
		self.root.join("downloads")
	}

	pub fn profile_dir(&self) -> PathBuf {
		self.root.join("profiles").join(&self.profile)
	}

	pub fn scratch_dir(&self) -> PathBuf {
		self.root.join("temp_extract")
	}

	fn folder_map_path(&self) -> PathBuf {
		self.root.join(".collection-rs").join("folders.bin")
	}

	/// Install destination of a package folder.
	pub fn package_dir(&self, folder_name: &str) -> PathBuf {
		self.mods_dir().join(folder_name)
	}

	/* Folder names */

	/// Gives every package without a folder name one.
	///
	/// Names remembered for the same identity are reused, otherwise [`Package::default_folder_name`] is used.
	/// Names are unique ignoring case; clashes get a ` (2)`, ` (3)`... suffix.
	/// Packages sharing an identity are remembered by their occurrence in the manifest.
	///
	/// # Returns
	/// The number of packages that were given a new name.
	pub fn assign_folder_names(&mut self, packages: &mut [Package]) -> usize {
		let mut taken: HashSet<String> = packages
			.iter()
			.filter_map(|p| p.folder_name().map(str::to_lowercase))
			.collect();
		let mut occurrences = HashMap::<String, usize>::new();
		let mut assigned = 0;

		for package in packages.iter_mut() {
			let identity = package.identity_key();
			let seen = occurrences.entry(identity.clone()).or_default();
			*seen += 1;
			let key = if *seen == 1 { identity } else { format!("{}#{}", identity, seen) };

			if package.folder_name().is_some() {
				continue;
			}

			let base = match self.folder_map.get(&key) {
				Some(known) if !taken.contains(&known.to_lowercase()) => known.clone(),
				_ => package.default_folder_name(),
			};

			let mut name = base.clone();
			let mut n = 2;
			while taken.contains(&name.to_lowercase()) {
				name = format!("{} ({})", base, n);
				n += 1;
			}

			log::trace!("Package {} installs to folder \"{}\"", package, name);
			taken.insert(name.to_lowercase());
			self.folder_map.insert(key, name.clone());
			package.assign_folder_name(name);
			assigned += 1;
		}

		assigned
	}

	/* Serialization */

	/// Saves the folder map.
	///
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when creating the file or its parent directory.
	/// - [`Bincode`](crate::error::Error::Bincode) when serializing.
	pub fn save_to_disk(&self) -> crate::Result<()> {
		let path = self.folder_map_path();
		std::fs::create_dir_all(path.with_file_name(""))?;
		let file = std::fs::File::create(path)?;
		bincode::serialize_into(file, &self.folder_map)?;
		Ok(())
	}
}
