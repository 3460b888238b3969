use collection_rs::manifest::{Package, PackageSource};
use collection_rs::HostInstance;

fn remote(index: usize, name: &str, hash: &str, mod_id: i64) -> Package {
	let mut p = Package::new(index, name, PackageSource::Remote { mod_id, file_id: 1 });
	p.logical_filename = name.to_string();
	p.content_hash = hash.to_string();
	p
}

#[test]
fn creates_managed_directories() {
	let dir = tempfile::tempdir().unwrap();
	let instance = HostInstance::new(dir.path(), "Survival").unwrap();

	assert!(instance.mods_dir().is_dir());
	assert!(instance.downloads_dir().is_dir());
	assert!(instance.scratch_dir().is_dir());
	assert_eq!(instance.profile_dir(), dir.path().join("profiles").join("Survival"));
	assert!(instance.profile_dir().is_dir());
}

#[test]
fn clashing_names_get_suffixes() {
	let (_dir, mut instance) = collection_rs_test_utils::temp_host().unwrap();
	let mut packages = vec![
		collection_rs_test_utils::direct_package(0, "Armor", "https://host/a.zip"),
		collection_rs_test_utils::direct_package(1, "armor", "https://host/b.zip"),
		collection_rs_test_utils::direct_package(2, "Armor", "https://host/c.zip"),
	];

	assert_eq!(instance.assign_folder_names(&mut packages), 3);
	let names = packages.iter().map(|p| p.folder_name().unwrap()).collect::<Vec<_>>();
	assert_eq!(names, vec!["Armor", "armor (2)", "Armor (3)"]);
}

#[test]
fn remote_names_carry_ids() {
	let (_dir, mut instance) = collection_rs_test_utils::temp_host().unwrap();
	let mut packages = vec![remote(0, "Weather: Mod", "aa", 42)];
	instance.assign_folder_names(&mut packages);
	assert_eq!(packages[0].folder_name(), Some("Weather_ Mod-42-1"));
}

#[test]
fn folder_names_survive_a_reload() {
	let dir = tempfile::tempdir().unwrap();

	{
		let mut instance = HostInstance::new(dir.path(), "Default").unwrap();
		let mut packages = vec![remote(0, "Patch", "aa", 1)];
		instance.assign_folder_names(&mut packages);
		assert!(!packages[0].assign_folder_name("ignored"));
		instance.save_to_disk().unwrap();
	}

	/* Same hash under a new name and position keeps its folder */
	let mut instance = HostInstance::new(dir.path(), "Default").unwrap();
	let mut packages = vec![
		remote(0, "Something Else", "bb", 2),
		remote(1, "Patch Renamed", "aa", 1),
	];
	instance.assign_folder_names(&mut packages);
	assert_eq!(packages[1].folder_name(), Some("Patch-1-1"));
	assert_eq!(packages[0].folder_name(), Some("Something Else-2-1"));
}

#[test]
fn preassigned_names_are_kept() {
	let (_dir, mut instance) = collection_rs_test_utils::temp_host().unwrap();
	let mut packages = vec![
		collection_rs_test_utils::direct_package(0, "A", "https://host/a.zip"),
		collection_rs_test_utils::direct_package(1, "B", "https://host/b.zip"),
	];
	packages[0].assign_folder_name("B");

	assert_eq!(instance.assign_folder_names(&mut packages), 1);
	assert_eq!(packages[0].folder_name(), Some("B"));
	assert_eq!(packages[1].folder_name(), Some("B (2)"));
}

#[test]
fn shared_identity_keeps_separate_folders() {
	let dir = tempfile::tempdir().unwrap();
	let packages = || vec![remote(0, "Main", "aa", 1), remote(1, "Patch", "aa", 2)];

	{
		let mut instance = HostInstance::new(dir.path(), "Default").unwrap();
		let mut first = packages();
		instance.assign_folder_names(&mut first);
		assert_eq!(first[0].folder_name(), Some("Main-1-1"));
		assert_eq!(first[1].folder_name(), Some("Patch-2-1"));
		instance.save_to_disk().unwrap();
	}

	let mut instance = HostInstance::new(dir.path(), "Default").unwrap();
	let mut second = packages();
	instance.assign_folder_names(&mut second);
	assert_eq!(second[0].folder_name(), Some("Main-1-1"));
	assert_eq!(second[1].folder_name(), Some("Patch-2-1"));
}
