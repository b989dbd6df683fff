//! Declarative registry of CloudFormation intrinsic functions

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
	Ref,
	Condition,
	Base64,
	Cidr,
	FindInMap,
	ForEach,
	GetAtt,
	GetAZs,
	ImportValue,
	Join,
	Length,
	Select,
	Split,
	Sub,
	ToJsonString,
	Transform,
	If,
	Equals,
	Not,
	And,
	Or,
}

/// Definition of an intrinsic function
#[derive(Debug)]
pub struct IntrinsicDef {
	pub kind: Intrinsic,
	/// Shorthand tag without the leading `!`
	pub yaml_tag: &'static str,
	/// Canonical single key of the long form
	pub json_key: &'static str,
}

macro_rules! intrinsic {
	($kind:ident, $tag:literal, $key:literal) => {
		IntrinsicDef {
			kind: Intrinsic::$kind,
			yaml_tag: $tag,
			json_key: $key,
		}
	};
}

/// Every intrinsic the linter understands, in `Intrinsic` declaration order.
/// `Ref` and `Condition` are the two functions whose canonical key does not
/// carry the `Fn::` prefix.
pub static INTRINSICS: &[IntrinsicDef] = &[
	intrinsic!(Ref, "Ref", "Ref"),
	intrinsic!(Condition, "Condition", "Condition"),
	intrinsic!(Base64, "Base64", "Fn::Base64"),
	intrinsic!(Cidr, "Cidr", "Fn::Cidr"),
	intrinsic!(FindInMap, "FindInMap", "Fn::FindInMap"),
	intrinsic!(ForEach, "ForEach", "Fn::ForEach"),
	intrinsic!(GetAtt, "GetAtt", "Fn::GetAtt"),
	intrinsic!(GetAZs, "GetAZs", "Fn::GetAZs"),
	intrinsic!(ImportValue, "ImportValue", "Fn::ImportValue"),
	intrinsic!(Join, "Join", "Fn::Join"),
	intrinsic!(Length, "Length", "Fn::Length"),
	intrinsic!(Select, "Select", "Fn::Select"),
	intrinsic!(Split, "Split", "Fn::Split"),
	intrinsic!(Sub, "Sub", "Fn::Sub"),
	intrinsic!(ToJsonString, "ToJsonString", "Fn::ToJsonString"),
	intrinsic!(Transform, "Transform", "Fn::Transform"),
	intrinsic!(If, "If", "Fn::If"),
	intrinsic!(Equals, "Equals", "Fn::Equals"),
	intrinsic!(Not, "Not", "Fn::Not"),
	intrinsic!(And, "And", "Fn::And"),
	intrinsic!(Or, "Or", "Fn::Or"),
];

/// `{{resolve:service:reference}}` anywhere in a string
pub static DYNAMIC_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\{\{resolve:(ssm|ssm-secure|secretsmanager):[^}]+\}\}")
		.expect("dynamic reference pattern is valid")
});

/// Look up intrinsic by YAML tag
pub fn get_intrinsic_by_tag(tag: &str) -> Option<&'static IntrinsicDef> {
	INTRINSICS.iter().find(|i| i.yaml_tag == tag)
}

/// Look up intrinsic by JSON key
pub fn get_intrinsic_by_json_key(key: &str) -> Option<&'static IntrinsicDef> {
	INTRINSICS.iter().find(|i| i.json_key == key)
}

impl Intrinsic {
	pub fn from_key(key: &str) -> Option<Self> {
		get_intrinsic_by_json_key(key).map(|def| def.kind)
	}

	pub fn from_tag(tag: &str) -> Option<Self> {
		get_intrinsic_by_tag(tag).map(|def| def.kind)
	}

	pub fn def(self) -> &'static IntrinsicDef {
		// INTRINSICS is laid out in declaration order
		&INTRINSICS[self as usize]
	}

	pub fn key(self) -> &'static str {
		self.def().json_key
	}

	pub fn tag(self) -> &'static str {
		self.def().yaml_tag
	}

	/// Functions only legal inside `Conditions`, `Fn::If` conditions and rules
	pub fn is_condition_function(self) -> bool {
		matches!(
			self,
			Intrinsic::Condition
				| Intrinsic::Equals
				| Intrinsic::Not
				| Intrinsic::And
				| Intrinsic::Or
		)
	}
}

impl fmt::Display for Intrinsic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.key())
	}
}

/// Canonical key a shorthand tag normalizes to. Unknown tags map to `Fn::<tag>`
/// so a rule can report them; they are still not intrinsic invocations.
pub fn canonical_key_for_tag(tag: &str) -> String {
	match get_intrinsic_by_tag(tag) {
		Some(def) => def.json_key.to_string(),
		None => format!("Fn::{tag}"),
	}
}
