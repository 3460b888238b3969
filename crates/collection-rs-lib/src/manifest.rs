//! Collection manifest.
//!
//! A manifest is a JSON document listing the packages of a collection, pairwise ordering
//! rules between them and the components (plugins) the collection expects to be enabled.
//!
//! Fields are read by path and anything missing or `null` takes an empty default,
//! only a malformed document or a non-object root is an error.

use serde_json::Value;

pub mod package;
pub use package::*;
pub mod rule;
pub use rule::*;

/// Game used when the manifest doesn't name one.
pub const DEFAULT_DOMAIN: &str = "skyrimspecialedition";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionInfo {
	pub name: String,
	pub author: String,
	/// Game domain used when asking the remote catalog for links.
	pub domain: String,
}

/// A component listed by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEntry {
	pub name: String,
	pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
	pub info: CollectionInfo,
	pub packages: Vec<Package>,
	pub rules: Vec<OrderingRule>,
	pub components: Vec<ComponentEntry>,
}

impl Manifest {
	/// Reads a manifest from a file.
	///
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when reading the file.
	/// - [`Parse`](crate::error::Error::Parse) when the document isn't a JSON object.
	pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let data = std::fs::read(path.as_ref())?;
		log::debug!("Parsing manifest {}", path.as_ref().display());
		Self::parse(&data)
	}

	/// Parses a manifest document.
	///
	/// # Errors
	/// - [`Parse`](crate::error::Error::Parse) on malformed JSON or when the root is not an object.
	pub fn parse(data: &[u8]) -> crate::Result<Self> {
		let root: Value = serde_json::from_slice(data).map_err(|e| crate::Error::Parse(format!("manifest is not valid JSON: {}", e)))?;
		if !root.is_object() {
			return Err(crate::Error::Parse("manifest root is not an object".to_string()));
		}

		let info = CollectionInfo {
			name: string_at(&root, &["info", "name"]),
			author: string_at(&root, &["info", "author"]),
			domain: Some(string_at(&root, &["info", "domainName"]))
				.filter(|d| !d.is_empty())
				.unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
		};

		let packages = array_at(&root, &["mods"])
			.iter()
			.enumerate()
			.map(|(index, m)| Package::from_manifest_entry(index, m))
			.collect::<Vec<_>>();

		let rules = array_at(&root, &["modRules"])
			.iter()
			.map(OrderingRule::from_manifest_entry)
			.collect::<Vec<_>>();

		let components = array_at(&root, &["plugins"])
			.iter()
			.map(|p| ComponentEntry {
				name: string_at(p, &["name"]),
				enabled: value_at(p, &["enabled"]).and_then(Value::as_bool).unwrap_or(true),
			})
			.filter(|c| !c.name.is_empty())
			.collect::<Vec<_>>();

		log::info!("Loaded collection \"{}\" by {}: {} packages, {} rules, {} components",
			info.name, info.author, packages.len(), rules.len(), components.len());

		Ok(Manifest { info, packages, rules, components })
	}
}

/* Path helpers, every missing step or null yields the default */

pub(crate) fn value_at<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
	let mut current = value;
	for key in path {
		current = current.get(key)?;
	}
	(!current.is_null()).then_some(current)
}

pub(crate) fn string_at(value: &Value, path: &[&str]) -> String {
	match value_at(value, path) {
		Some(Value::String(s)) => s.clone(),
		Some(Value::Number(n)) => n.to_string(),
		_ => String::new(),
	}
}

pub(crate) fn int_at(value: &Value, path: &[&str]) -> i64 {
	match value_at(value, path) {
		Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
		Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
		_ => 0,
	}
}

pub(crate) fn array_at<'v>(value: &'v Value, path: &[&str]) -> &'v [Value] {
	value_at(value, path).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn non_object_root_fails() { assert!(Manifest::parse(b"[1, 2]").is_err()); }

	#[test]
	fn malformed_fails() { assert!(Manifest::parse(b"{\"mods\": [").is_err()); }

	#[test]
	fn empty_object_defaults() {
		let manifest = Manifest::parse(b"{}").unwrap();
		assert!(manifest.packages.is_empty());
		assert_eq!(manifest.info.domain, DEFAULT_DOMAIN);
	}

	#[test]
	fn numbers_read_from_strings() {
		let v: Value = serde_json::json!({"a": {"b": "42"}});
		assert_eq!(int_at(&v, &["a", "b"]), 42);
		assert_eq!(int_at(&v, &["a", "c"]), 0);
	}
}
