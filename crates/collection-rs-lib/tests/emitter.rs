use collection_rs::emitter::*;

fn header() -> String {
	format!("# This file was automatically generated by collection-rs {}\n", env!("CARGO_PKG_VERSION"))
}

#[test]
fn writes_both_lists() {
	let dir = tempfile::tempdir().unwrap();
	let profile = dir.path().join("profiles").join("Default");

	let lists = Emitter::new(&profile).emit(&["Winner", "Loser"], &["Base.esm", "Patch.esp"]).unwrap();

	assert_eq!(lists.package_list, profile.join(PACKAGE_LIST));
	assert_eq!(
		std::fs::read_to_string(&lists.package_list).unwrap(),
		header() + "# Mod priority: Top = Winner, Bottom = Loser\n+Winner\n+Loser\n",
	);
	assert_eq!(
		std::fs::read_to_string(&lists.component_list).unwrap(),
		header() + "*Base.esm\n*Patch.esp\n",
	);
}

#[test]
fn lists_are_replaced() {
	let dir = tempfile::tempdir().unwrap();
	let emitter = Emitter::new(dir.path());

	emitter.emit(&["A", "B", "C"], &["a.esp"]).unwrap();
	let lists = emitter.emit(&["C"], &Vec::<String>::new()).unwrap();

	let packages = std::fs::read_to_string(&lists.package_list).unwrap();
	assert!(packages.ends_with("Loser\n+C\n"));
	assert_eq!(std::fs::read_to_string(&lists.component_list).unwrap(), header());

	/* Only the two lists remain, no temporary files */
	let mut names = std::fs::read_dir(dir.path())
		.unwrap()
		.map(|e| e.unwrap().file_name().to_string_lossy().to_string())
		.collect::<Vec<_>>();
	names.sort();
	assert_eq!(names, vec![PACKAGE_LIST, COMPONENT_LIST]);
}
