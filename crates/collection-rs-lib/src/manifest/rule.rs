use serde_json::Value;

use super::string_at;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
	/// Source must rank below reference.
	Before,
	/// Source must rank above reference.
	After,
	/// Any other relation (`requires`, `conflicts`, ...), not used for ordering.
	Other(String),
}

/// Reference to a package by content hash or logical file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRef {
	pub content_hash: String,
	pub logical_filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingRule {
	pub kind: RuleKind,
	pub source: PackageRef,
	pub reference: PackageRef,
}

impl OrderingRule {
	pub fn before(source: PackageRef, reference: PackageRef) -> Self {
		Self { kind: RuleKind::Before, source, reference }
	}

	pub fn after(source: PackageRef, reference: PackageRef) -> Self {
		Self { kind: RuleKind::After, source, reference }
	}

	pub(crate) fn from_manifest_entry(entry: &Value) -> Self {
		let kind = match string_at(entry, &["type"]).as_str() {
			"before" => RuleKind::Before,
			"after" => RuleKind::After,
			other => RuleKind::Other(other.to_string()),
		};

		let endpoint = |key: &str| PackageRef {
			content_hash: string_at(entry, &[key, "fileMD5"]).to_lowercase(),
			logical_filename: string_at(entry, &[key, "logicalFileName"]),
		};

		Self { kind, source: endpoint("source"), reference: endpoint("reference") }
	}
}

impl PackageRef {
	pub fn by_hash(content_hash: impl Into<String>) -> Self {
		Self { content_hash: content_hash.into(), ..Default::default() }
	}

	pub fn by_name(logical_filename: impl Into<String>) -> Self {
		Self { logical_filename: logical_filename.into(), ..Default::default() }
	}
}
