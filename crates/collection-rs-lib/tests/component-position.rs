use std::path::PathBuf;

use collection_rs::manifest::ComponentEntry;
use collection_rs::ordering::component_position::*;
use collection_rs_test_utils::*;

struct FailingSorter;

impl ComponentSorter for FailingSorter {
	fn sort(&self, _installed_dirs: &[PathBuf], _candidates: &[String]) -> Result<Vec<String>, SortError> {
		Err(SortError::Empty)
	}
}

/// Records the directories it was handed and reverses the candidates.
#[derive(Default)]
struct ReversingSorter {
	seen_dirs: std::sync::Mutex<Vec<PathBuf>>,
}

impl ComponentSorter for ReversingSorter {
	fn sort(&self, installed_dirs: &[PathBuf], candidates: &[String]) -> Result<Vec<String>, SortError> {
		if let Ok(mut seen) = self.seen_dirs.lock() {
			seen.extend_from_slice(installed_dirs);
		}
		Ok(candidates.iter().rev().cloned().collect())
	}
}

fn entry(name: &str, enabled: bool) -> ComponentEntry {
	ComponentEntry { name: name.to_string(), enabled }
}

#[test]
fn components_found_by_extension() {
	let dir = tempfile::tempdir().unwrap();
	write_tree(dir.path(), &[
		("c.esl", ""),
		("A.esp", ""),
		("sub/B.ESM", ""),
		("readme.txt", ""),
		("archive.bsa", ""),
	]).unwrap();

	assert_eq!(find_components(dir.path()), vec!["A.esp", "B.ESM", "c.esl"]);
}

#[test]
fn enabled_manifest_components_are_candidates() {
	let (_dir, mut instance) = temp_host().unwrap();
	let mut packages = vec![direct_package(0, "A", "https://host/a.zip")];
	instance.assign_folder_names(&mut packages);
	write_tree(&instance.package_dir("A"), &[("found.esp", "")]).unwrap();

	let resolver = PositionResolver::new(instance.mods_dir(), 2);
	let components = vec![entry("One.esp", true), entry("off.esp", false), entry("one.ESP", true), entry("Two.esm", true)];
	assert_eq!(resolver.candidates(&components, &packages), vec!["One.esp", "Two.esm"]);
}

#[test]
fn installed_components_used_without_manifest_list() {
	let (_dir, mut instance) = temp_host().unwrap();
	let mut packages = vec![
		direct_package(0, "A", "https://host/a.zip"),
		direct_package(1, "B", "https://host/b.zip"),
	];
	instance.assign_folder_names(&mut packages);
	write_tree(&instance.package_dir("A"), &[("a.esp", ""), ("shared.esm", "")]).unwrap();
	write_tree(&instance.package_dir("B"), &[("Shared.esm", ""), ("b.esl", "")]).unwrap();

	let resolver = PositionResolver::new(instance.mods_dir(), 2);
	let candidates = resolver.candidates(&[entry("disabled.esp", false)], &packages);
	assert_eq!(candidates, vec!["a.esp", "shared.esm", "b.esl"]);
}

#[test]
fn sorter_failure_keeps_candidate_order() {
	let (_dir, instance) = temp_host().unwrap();
	let resolver = PositionResolver::new(instance.mods_dir(), 1);
	let candidates = vec!["b.esp".to_string(), "a.esp".to_string()];

	assert_eq!(resolver.component_order(&FailingSorter, &[], &candidates), candidates);
	assert_eq!(resolver.component_order(&ManifestOrderSorter, &[], &candidates), candidates);
}

#[test]
fn sorter_gets_installed_directories() {
	let (_dir, mut instance) = temp_host().unwrap();
	let mut packages = vec![
		direct_package(0, "A", "https://host/a.zip"),
		direct_package(1, "Missing", "https://host/b.zip"),
	];
	instance.assign_folder_names(&mut packages);
	write_tree(&instance.package_dir("A"), &[("a.esp", "")]).unwrap();

	let sorter = ReversingSorter::default();
	let resolver = PositionResolver::new(instance.mods_dir(), 1);
	let order = resolver.component_order(&sorter, &packages, &["a.esp".to_string(), "b.esp".to_string()]);

	assert_eq!(order, vec!["b.esp", "a.esp"]);
	assert_eq!(*sorter.seen_dirs.lock().unwrap(), vec![instance.package_dir("A")]);
}

#[test]
fn package_takes_earliest_component_position() {
	let (_dir, mut instance) = temp_host().unwrap();
	let mut packages = (0..5)
		.map(|i| direct_package(i, &format!("P{}", i), "https://host/p.zip"))
		.collect::<Vec<_>>();
	instance.assign_folder_names(&mut packages);
	write_tree(&instance.package_dir("P0"), &[("late.esp", ""), ("EARLY.esm", "")]).unwrap();
	write_tree(&instance.package_dir("P1"), &[("unknown.esp", "")]).unwrap();
	write_tree(&instance.package_dir("P3"), &[("middle.esl", "")]).unwrap();

	let order = vec!["early.esm".to_string(), "middle.esl".to_string(), "late.esp".to_string(), "Early.esm".to_string()];
	let map = PositionResolver::position_map(&order);
	assert_eq!(map.get("early.esm"), Some(&0));

	/* More threads than packages still covers every package */
	let resolver = PositionResolver::new(instance.mods_dir(), 8);
	assert_eq!(resolver.resolve(&packages, &map), vec![Some(0), None, None, Some(1), None]);
}

#[cfg(unix)]
#[test]
fn command_sorter_reads_lines() {
	let sorter = CommandSorter::new("sh", vec!["-c".to_string(), "cat > /dev/null; printf 'b.esp\\n\\n a.esp \\n'".to_string()]);
	let sorted = sorter.sort(&[], &["a.esp".to_string(), "b.esp".to_string()]).unwrap();
	assert_eq!(sorted, vec!["b.esp", "a.esp"]);
}

#[cfg(unix)]
#[test]
fn command_sorter_failures() {
	let failing = CommandSorter::from_command_line("sh -c false").unwrap();
	assert!(matches!(failing.sort(&[], &[]), Err(SortError::CommandFailed(_))));

	let silent = CommandSorter::new("sh", vec!["-c".to_string(), "cat > /dev/null".to_string()]);
	assert!(matches!(silent.sort(&[], &["a.esp".to_string()]), Err(SortError::Empty)));

	let missing = CommandSorter::new("/nonexistent/sorter", Vec::new());
	assert!(matches!(missing.sort(&[], &[]), Err(SortError::IO(_))));

	assert!(CommandSorter::from_command_line("   ").is_none());
}
