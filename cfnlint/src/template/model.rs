use std::collections::HashMap;

use crate::template::node::{Key, Node, Origin, Path};

/// Resource logical IDs with this prefix declare a language-extension loop
pub const FOR_EACH_PREFIX: &str = "Fn::ForEach::";

/// Semantic model of a CloudFormation template.
///
/// A read-only view over one parsed document: every entry borrows the node it
/// was built from, so a diagnostic about it can always recover a position.
#[derive(Debug, Clone)]
pub struct CfnTemplate<'a> {
	pub(crate) root: &'a Node,
	pub format_version: Option<&'a str>,
	pub description: Option<&'a str>,
	pub transform: Option<CfnTransform<'a>>,
	pub metadata: Option<&'a Node>,
	pub parameters: HashMap<String, CfnParameter<'a>>,
	pub resources: HashMap<String, CfnResource<'a>>,
	pub for_each: HashMap<String, CfnForEach<'a>>,
	pub conditions: HashMap<String, CfnCondition<'a>>,
	pub mappings: HashMap<String, CfnMapping<'a>>,
	pub outputs: HashMap<String, CfnOutput<'a>>,
	pub rules: HashMap<String, CfnRule<'a>>,
	/// Top-level keys that are not template sections, kept for structure rules
	pub unknown_sections: Vec<(&'a Key, &'a Node)>,
	/// Sections or entries with the wrong shape
	pub errors: Vec<ModelError>,
}

impl<'a> CfnTemplate<'a> {
	pub fn root(&self) -> &'a Node {
		self.root
	}

	/// Raw node of a top-level section
	pub fn section(&self, name: &str) -> Option<&'a Node> {
		self.root.get(name)
	}

	pub fn has_resource(&self, name: &str) -> bool {
		self.resources.contains_key(name)
	}

	pub fn has_parameter(&self, name: &str) -> bool {
		self.parameters.contains_key(name)
	}

	pub fn has_condition(&self, name: &str) -> bool {
		self.conditions.contains_key(name)
	}

	pub fn has_mapping(&self, name: &str) -> bool {
		self.mappings.contains_key(name)
	}

	pub fn has_output(&self, name: &str) -> bool {
		self.outputs.contains_key(name)
	}

	/// Whether `Transform` lists the given macro
	pub fn has_transform(&self, name: &str) -> bool {
		self.transform
			.as_ref()
			.is_some_and(|t| t.names().any(|n| n == name))
	}
}

/// The template's `Transform`: one macro name or a list of them
#[derive(Debug, Clone)]
pub enum CfnTransform<'a> {
	Single(&'a str),
	/// Items are usually names, but `{Name: ..., Parameters: ...}` is allowed
	List(Vec<&'a Node>),
}

impl<'a> CfnTransform<'a> {
	pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
		let (single, list) = match self {
			CfnTransform::Single(name) => (Some(*name), &[][..]),
			CfnTransform::List(items) => (None, items.as_slice()),
		};
		single.into_iter().chain(list.iter().filter_map(|item| {
			item.as_str()
				.or_else(|| item.get("Name").and_then(Node::as_str))
		}))
	}
}

/// A CloudFormation parameter declaration
#[derive(Debug, Clone)]
pub struct CfnParameter<'a> {
	pub key: &'a Key,
	pub node: &'a Node,
	pub path: Path,
	/// "String", "Number", "List<Number>", ... when written as a string
	pub parameter_type: Option<&'a str>,
	pub default_value: Option<&'a Node>,
	pub description: Option<&'a str>,
	pub constraints: ParameterConstraints<'a>,
}

impl CfnParameter<'_> {
	pub fn name(&self) -> &str {
		&self.key.name
	}
}

#[derive(Debug, Clone, Default)]
pub struct ParameterConstraints<'a> {
	pub allowed_values: Option<&'a Node>,
	pub allowed_pattern: Option<&'a Node>,
	pub min_length: Option<&'a Node>,
	pub max_length: Option<&'a Node>,
	pub min_value: Option<&'a Node>,
	pub max_value: Option<&'a Node>,
	pub no_echo: Option<&'a Node>,
	pub constraint_description: Option<&'a Node>,
}

/// A CloudFormation resource
#[derive(Debug, Clone)]
pub struct CfnResource<'a> {
	pub key: &'a Key,
	pub node: &'a Node,
	pub path: Path,
	pub resource_type: Option<&'a str>,
	pub properties: Option<&'a Node>,
	/// `DependsOn` as written, string or list of strings
	pub depends_on: Vec<&'a str>,
	pub condition: Option<&'a str>,
	pub deletion_policy: Option<&'a Node>,
	pub update_replace_policy: Option<&'a Node>,
	pub creation_policy: Option<&'a Node>,
	pub update_policy: Option<&'a Node>,
	pub metadata: Option<&'a Node>,
}

impl CfnResource<'_> {
	pub fn logical_id(&self) -> &str {
		&self.key.name
	}

	pub fn origin(&self) -> Origin {
		self.key.origin
	}
}

/// `Fn::ForEach::<LoopName>: [Identifier, Collection, {OutputKey: Template}]`
/// declared among the resources
#[derive(Debug, Clone)]
pub struct CfnForEach<'a> {
	pub key: &'a Key,
	pub node: &'a Node,
	pub path: Path,
	pub loop_name: &'a str,
	pub identifier: &'a Node,
	pub collection: &'a Node,
	/// `{OutputKey: ResourceTemplate}`
	pub template: &'a Node,
}

/// A CloudFormation condition declaration
#[derive(Debug, Clone)]
pub struct CfnCondition<'a> {
	pub key: &'a Key,
	pub expression: &'a Node,
	pub path: Path,
}

impl CfnCondition<'_> {
	pub fn name(&self) -> &str {
		&self.key.name
	}
}

/// A two-level lookup table: `MapName -> TopLevelKey -> SecondLevelKey -> value`
#[derive(Debug, Clone)]
pub struct CfnMapping<'a> {
	pub key: &'a Key,
	pub node: &'a Node,
	pub path: Path,
	pub table: HashMap<String, HashMap<String, &'a Node>>,
}

impl<'a> CfnMapping<'a> {
	pub fn name(&self) -> &str {
		&self.key.name
	}

	pub fn lookup(&self, top_level: &str, second_level: &str) -> Option<&'a Node> {
		self.table.get(top_level)?.get(second_level).copied()
	}
}

#[derive(Debug, Clone)]
pub struct CfnOutput<'a> {
	pub key: &'a Key,
	pub node: &'a Node,
	pub path: Path,
	pub value: Option<&'a Node>,
	/// The `Export.Name` node
	pub export: Option<&'a Node>,
	pub description: Option<&'a str>,
	pub condition: Option<&'a str>,
}

impl CfnOutput<'_> {
	pub fn name(&self) -> &str {
		&self.key.name
	}
}

/// An entry of the `Rules` section (parameter assertions)
#[derive(Debug, Clone)]
pub struct CfnRule<'a> {
	pub key: &'a Key,
	pub node: &'a Node,
	pub path: Path,
	pub rule_condition: Option<&'a Node>,
	pub assertions: Vec<CfnAssertion<'a>>,
}

impl CfnRule<'_> {
	pub fn name(&self) -> &str {
		&self.key.name
	}
}

#[derive(Debug, Clone)]
pub struct CfnAssertion<'a> {
	pub assert: &'a Node,
	pub description: Option<&'a str>,
	pub path: Path,
}

/// A top-level section or section entry with the wrong shape.
///
/// Non-fatal: the rest of the model is still built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
	pub message: String,
	pub path: Path,
	pub origin: Origin,
}
