use std::sync::Arc;

use collection_rs::easy_installer::install_collection;
use collection_rs::emitter::{COMPONENT_LIST, PACKAGE_LIST};
use collection_rs::installation::extract::ArchiveExtractor;
use collection_rs::installation::materialize::StandardMaterializer;
use collection_rs::installation::pipeline::{AlwaysContinue, Collaborators, NeverContinue, Stage};
use collection_rs::ordering::component_position::ManifestOrderSorter;
use collection_rs::{Config, Manifest};
use collection_rs_test_utils::*;

const COLLECTION: &str = r#"{
	"info": { "name": "End To End", "author": "tester" },
	"mods": [
		{ "name": "A", "source": { "type": "direct", "url": "https://host/a.zip", "logicalFilename": "A" } },
		{ "name": "B", "source": { "type": "direct", "url": "https://host/b.zip", "logicalFilename": "B" } },
		{ "name": "C", "source": { "type": "direct", "url": "https://host/c.zip", "logicalFilename": "C" } }
	],
	"modRules": [
		{ "type": "before", "source": { "logicalFileName": "C" }, "reference": { "logicalFileName": "A" } }
	]
}"#;

fn config() -> Config {
	let mut config = Config::default();
	config.set_retry_backoff_secs(0);
	config
}

fn collaborators(transfer: ScriptedTransfer) -> Collaborators {
	Collaborators {
		transfer: Arc::new(transfer),
		catalog: None,
		extractor: Arc::new(ArchiveExtractor::new("7z")),
		materializer: Arc::new(StandardMaterializer),
	}
}

/// One zip per package with a single plugin named after it.
fn scripted(dir: &std::path::Path, names: &[&str]) -> ScriptedTransfer {
	names.iter().fold(ScriptedTransfer::new(), |transfer, name| {
		let archive = dir.join("fixtures").join(format!("{}.zip", name));
		let plugin = format!("{}/{}.esp", name.to_uppercase(), name);
		write_zip(&archive, &[(plugin.as_str(), "esp")]).unwrap();
		transfer.script(&format!("https://host/{}.zip", name), vec![Response::File(archive)])
	})
}

#[test]
fn full_install() {
	let _ = env_logger::builder().is_test(true).try_init();
	let (dir, mut instance) = temp_host().unwrap();
	let transfer = scripted(dir.path(), &["a", "b", "c"]);
	let manifest = Manifest::parse(COLLECTION.as_bytes()).unwrap();

	let summary = install_collection(&config(), &mut instance, manifest, collaborators(transfer), &ManifestOrderSorter, &NeverContinue).unwrap();

	assert!(summary.succeeded());
	assert_eq!(summary.pipeline.installed, 3);
	assert_eq!(summary.rules.applied, 1);
	assert_eq!(summary.violations(), 0);
	/* C must lose to A */
	assert_eq!(summary.package_list, vec!["A", "C", "B"]);
	assert_eq!(summary.component_list, vec!["a.esp", "b.esp", "c.esp"]);

	let profile = instance.profile_dir();
	let modlist = std::fs::read_to_string(profile.join(PACKAGE_LIST)).unwrap();
	assert!(modlist.ends_with("+A\n+C\n+B\n"));
	let plugins = std::fs::read_to_string(profile.join(COMPONENT_LIST)).unwrap();
	assert!(plugins.ends_with("*a.esp\n*b.esp\n*c.esp\n"));

	assert!(instance.package_dir("B").join("b.esp").is_file());
	assert!(instance.root().join(".collection-rs").join("folders.bin").is_file());
}

#[test]
fn second_run_skips_everything() {
	let (dir, mut instance) = temp_host().unwrap();

	let first = scripted(dir.path(), &["a", "b", "c"]);
	install_collection(&config(), &mut instance, Manifest::parse(COLLECTION.as_bytes()).unwrap(), collaborators(first), &ManifestOrderSorter, &NeverContinue).unwrap();

	let summary = install_collection(&config(), &mut instance, Manifest::parse(COLLECTION.as_bytes()).unwrap(), collaborators(ScriptedTransfer::new()), &ManifestOrderSorter, &NeverContinue).unwrap();

	assert!(summary.succeeded());
	assert_eq!(summary.pipeline.skipped.len(), 3);
	assert_eq!(summary.pipeline.downloaded, 0);
	assert_eq!(summary.package_list, vec!["A", "C", "B"]);
}

#[test]
fn failed_package_left_out_of_list() {
	let (dir, mut instance) = temp_host().unwrap();
	let transfer = scripted(dir.path(), &["a", "c"]).script("https://host/b.zip", vec![Response::Status(404)]);

	let summary = install_collection(&config(), &mut instance, Manifest::parse(COLLECTION.as_bytes()).unwrap(), collaborators(transfer), &ManifestOrderSorter, &AlwaysContinue).unwrap();

	assert!(!summary.succeeded());
	assert_eq!(summary.pipeline.failed_stage(Stage::Download), 1);
	assert_eq!(summary.package_list, vec!["A", "C"]);
	assert!(summary.lists.is_some());
}

#[test]
fn declined_continue_writes_no_lists() {
	let (dir, mut instance) = temp_host().unwrap();
	let transfer = scripted(dir.path(), &["a", "c"]).script("https://host/b.zip", vec![Response::Refused]);

	let summary = install_collection(&config(), &mut instance, Manifest::parse(COLLECTION.as_bytes()).unwrap(), collaborators(transfer), &ManifestOrderSorter, &NeverContinue).unwrap();

	assert!(summary.pipeline.aborted);
	assert_eq!(summary.pipeline.failures[0].attempts, 4);
	assert!(summary.order.is_none());
	assert!(summary.lists.is_none());
	assert!(!instance.profile_dir().join(PACKAGE_LIST).exists());
}
