use collection_rs::manifest::*;
use collection_rs::ordering::ConstraintGraph;

fn test_collection() -> Manifest {
	let p = env!("CARGO_MANIFEST_DIR").to_owned() + "/test-data/collection.json";
	Manifest::load(p).unwrap()
}

#[test]
fn collection_info() {
	let manifest = test_collection();
	assert_eq!(manifest.info, CollectionInfo {
		name: "Test Collection".to_string(),
		author: "tester".to_string(),
		domain: "skyrimspecialedition".to_string(),
	});
}

#[test]
fn package_sources() {
	let manifest = test_collection();
	let sources = manifest.packages.iter().map(|p| p.source.clone()).collect::<Vec<_>>();
	assert_eq!(sources, vec![
		PackageSource::Remote { mod_id: 266, file_id: 1000 },
		PackageSource::Direct { url: "https://example.com/files/Sky Textures.zip".to_string() },
		PackageSource::Direct { url: "https://example.com/browse/manual.7z".to_string() },
		PackageSource::None,
		PackageSource::None,
	]);

	for (i, package) in manifest.packages.iter().enumerate() {
		assert_eq!(package.index, i);
		assert!(package.folder_name().is_none());
	}
}

#[test]
fn package_details() {
	let manifest = test_collection();
	let patch = &manifest.packages[0];
	assert_eq!(patch.content_hash, "0123456789abcdef0123456789abcdef");
	assert_eq!(patch.size, 4096);
	assert_eq!(patch.identity_key(), "md5:0123456789abcdef0123456789abcdef");

	let textures = &manifest.packages[1];
	assert_eq!(textures.expected_files, vec!["textures/sky/clouds.dds", "SkyTextures.esp"]);
	assert!(textures.choices.is_none());

	let manual = &manifest.packages[2];
	assert_eq!(manual.logical_key(), "Manual Download");
	assert_eq!(manual.choices.as_ref().and_then(|c| c.get("type")).and_then(|t| t.as_str()), Some("fomod"));
}

#[test]
fn rules_and_components() {
	let manifest = test_collection();
	let kinds = manifest.rules.iter().map(|r| r.kind.clone()).collect::<Vec<_>>();
	assert_eq!(kinds, vec![RuleKind::Before, RuleKind::After, RuleKind::Other("requires".to_string()), RuleKind::Before]);
	assert_eq!(manifest.rules[0].source, PackageRef::by_hash("0123456789abcdef0123456789abcdef"));

	/* Nameless entries are dropped, a missing flag means enabled */
	assert_eq!(manifest.components, vec![
		ComponentEntry { name: "Unofficial Patch.esp".to_string(), enabled: true },
		ComponentEntry { name: "SkyTextures.esp".to_string(), enabled: true },
		ComponentEntry { name: "Optional.esp".to_string(), enabled: false },
	]);
}

#[test]
fn rules_resolve_against_packages() {
	let manifest = test_collection();
	let graph = ConstraintGraph::build(&manifest.packages, &manifest.rules);

	assert_eq!(graph.stats.applied, 2);
	assert_eq!(graph.stats.ignored, 1);
	assert_eq!(graph.stats.unresolved, 1);
	/* Patch below textures, manual download above them */
	assert_eq!(graph.successors(0), &[1]);
	assert_eq!(graph.successors(1), &[2]);
}

#[test]
fn missing_file_is_an_io_error() {
	let result = Manifest::load("/nonexistent/collection.json");
	assert!(matches!(result, Err(collection_rs::Error::IO(_))));
}

#[test]
fn domain_defaults() {
	let manifest = Manifest::parse(br#"{"info": {"name": "x"}, "mods": null}"#).unwrap();
	assert_eq!(manifest.info.domain, DEFAULT_DOMAIN);
	assert!(manifest.packages.is_empty());
}
