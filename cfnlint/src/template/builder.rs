//! Semantic model builder
//!
//! One pass over the root mapping. A malformed section or entry is recorded as
//! a `ModelError` and skipped; everything else is still built.

use std::collections::HashMap;

use tracing::debug;

use crate::template::model::{
	CfnAssertion, CfnCondition, CfnForEach, CfnMapping, CfnOutput, CfnParameter, CfnResource,
	CfnRule, CfnTemplate, CfnTransform, FOR_EACH_PREFIX, ModelError, ParameterConstraints,
};
use crate::template::node::{Key, Node, NodeKind, Path};
use crate::template::source::Document;

/// Top-level keys CloudFormation recognises
pub const SECTIONS: &[&str] = &[
	"AWSTemplateFormatVersion",
	"Description",
	"Metadata",
	"Parameters",
	"Mappings",
	"Conditions",
	"Transform",
	"Resources",
	"Outputs",
	"Rules",
];

impl<'a> CfnTemplate<'a> {
	/// Build the model for a parsed document. Never fails.
	pub fn build(document: &'a Document) -> Self {
		Self::from_root(document.root())
	}

	/// Build the model over any mapping node
	pub fn from_root(root: &'a Node) -> Self {
		let mut errors = Vec::new();

		let format_version = section(root, "AWSTemplateFormatVersion")
			.and_then(|(key, node)| string_section(key, node, &mut errors));
		let description = section(root, "Description")
			.and_then(|(key, node)| string_section(key, node, &mut errors));
		let metadata = section(root, "Metadata")
			.and_then(|(key, node)| mapping_section(key, node, &mut errors).map(|_| node));
		let transform =
			section(root, "Transform").and_then(|(key, node)| parse_transform(key, node, &mut errors));

		let mut resources = HashMap::new();
		let mut for_each = HashMap::new();
		if let Some((key, node)) = section(root, "Resources") {
			parse_resources(key, node, &mut resources, &mut for_each, &mut errors);
		}

		let parameters = entries(root, "Parameters", "parameter", &mut errors, parse_parameter);
		let conditions = parse_conditions(root, &mut errors);
		let mappings = entries(root, "Mappings", "mapping", &mut errors, parse_mapping);
		let outputs = entries(root, "Outputs", "output", &mut errors, parse_output);
		let rules = entries(root, "Rules", "rule", &mut errors, parse_rule);

		let unknown_sections = root
			.as_mapping()
			.unwrap_or_default()
			.iter()
			.filter(|(key, _)| !SECTIONS.contains(&key.name.as_str()))
			.map(|(key, node)| (key, node))
			.collect::<Vec<_>>();

		debug!(
			resources = resources.len(),
			for_each = for_each.len(),
			parameters = parameters.len(),
			conditions = conditions.len(),
			mappings = mappings.len(),
			outputs = outputs.len(),
			rules = rules.len(),
			errors = errors.len(),
			"built template model"
		);

		CfnTemplate {
			root,
			format_version,
			description,
			transform,
			metadata,
			parameters,
			resources,
			for_each,
			conditions,
			mappings,
			outputs,
			rules,
			unknown_sections,
			errors,
		}
	}
}

fn section<'a>(root: &'a Node, name: &str) -> Option<(&'a Key, &'a Node)> {
	root.get_entry(name)
}

fn error(errors: &mut Vec<ModelError>, path: Path, node: &Node, message: String) {
	errors.push(ModelError {
		message,
		path,
		origin: node.origin,
	});
}

fn string_section<'a>(key: &Key, node: &'a Node, errors: &mut Vec<ModelError>) -> Option<&'a str> {
	let value = node.as_str();
	if value.is_none() {
		error(
			errors,
			Path::root().child(key.name.as_str()),
			node,
			format!("{} must be a string, found {}", key.name, node.type_name()),
		);
	}
	value
}

fn mapping_section<'a>(
	key: &Key,
	node: &'a Node,
	errors: &mut Vec<ModelError>,
) -> Option<&'a [(Key, Node)]> {
	let entries = node.as_mapping();
	if entries.is_none() {
		error(
			errors,
			Path::root().child(key.name.as_str()),
			node,
			format!("{} section must be a mapping, found {}", key.name, node.type_name()),
		);
	}
	entries
}

/// Collect the entries of a name -> mapping section. Entries that are not
/// mappings are reported and skipped; later duplicates replace earlier ones.
fn entries<'a, T>(
	root: &'a Node,
	name: &str,
	what: &str,
	errors: &mut Vec<ModelError>,
	build: impl Fn(&'a Key, &'a Node, Path) -> T,
) -> HashMap<String, T> {
	let mut collection = HashMap::new();
	let Some((section_key, node)) = section(root, name) else {
		return collection;
	};
	let Some(items) = mapping_section(section_key, node, errors) else {
		return collection;
	};

	for (key, value) in items {
		let path = Path::root().child(name).child(key.name.as_str());
		if value.as_mapping().is_none() {
			error(
				errors,
				path,
				value,
				format!(
					"{what} `{}` must be a mapping, found {}",
					key.name,
					value.type_name()
				),
			);
			continue;
		}
		collection.insert(key.name.clone(), build(key, value, path));
	}

	collection
}

fn parse_transform<'a>(
	key: &Key,
	node: &'a Node,
	errors: &mut Vec<ModelError>,
) -> Option<CfnTransform<'a>> {
	match &node.kind {
		NodeKind::Sequence(items) => Some(CfnTransform::List(items.iter().collect())),
		_ => match node.as_str() {
			Some(name) => Some(CfnTransform::Single(name)),
			None => {
				error(
					errors,
					Path::root().child(key.name.as_str()),
					node,
					format!(
						"Transform must be a string or a list, found {}",
						node.type_name()
					),
				);
				None
			}
		},
	}
}

fn parse_resources<'a>(
	section_key: &Key,
	node: &'a Node,
	resources: &mut HashMap<String, CfnResource<'a>>,
	for_each: &mut HashMap<String, CfnForEach<'a>>,
	errors: &mut Vec<ModelError>,
) {
	let Some(items) = mapping_section(section_key, node, errors) else {
		return;
	};

	for (key, value) in items {
		let path = Path::root().child("Resources").child(key.name.as_str());

		if let Some(loop_name) = key.name.strip_prefix(FOR_EACH_PREFIX) {
			match parse_for_each(key, loop_name, value, path.clone()) {
				Some(entry) => {
					for_each.insert(key.name.clone(), entry);
				}
				None => error(
					errors,
					path,
					value,
					format!(
						"`{}` must be a list of identifier, collection and output template",
						key.name
					),
				),
			}
			continue;
		}

		if value.as_mapping().is_none() {
			error(
				errors,
				path,
				value,
				format!(
					"resource `{}` must be a mapping, found {}",
					key.name,
					value.type_name()
				),
			);
			continue;
		}

		resources.insert(key.name.clone(), parse_resource(key, value, path));
	}
}

fn parse_resource<'a>(key: &'a Key, node: &'a Node, path: Path) -> CfnResource<'a> {
	let depends_on = match node.get("DependsOn") {
		Some(depends) => match &depends.kind {
			NodeKind::Sequence(items) => items.iter().filter_map(Node::as_str).collect(),
			_ => depends.as_str().into_iter().collect(),
		},
		None => Vec::new(),
	};

	CfnResource {
		key,
		node,
		path,
		resource_type: node.get("Type").and_then(Node::as_str),
		properties: node.get("Properties"),
		depends_on,
		condition: node.get("Condition").and_then(Node::as_str),
		deletion_policy: node.get("DeletionPolicy"),
		update_replace_policy: node.get("UpdateReplacePolicy"),
		creation_policy: node.get("CreationPolicy"),
		update_policy: node.get("UpdatePolicy"),
		metadata: node.get("Metadata"),
	}
}

fn parse_for_each<'a>(
	key: &'a Key,
	loop_name: &'a str,
	node: &'a Node,
	path: Path,
) -> Option<CfnForEach<'a>> {
	let [identifier, collection, template] = node.as_sequence()? else {
		return None;
	};

	Some(CfnForEach {
		key,
		node,
		path,
		loop_name,
		identifier,
		collection,
		template,
	})
}

fn parse_parameter<'a>(key: &'a Key, node: &'a Node, path: Path) -> CfnParameter<'a> {
	CfnParameter {
		key,
		node,
		path,
		parameter_type: node.get("Type").and_then(Node::as_str),
		default_value: node.get("Default"),
		description: node.get("Description").and_then(Node::as_str),
		constraints: ParameterConstraints {
			allowed_values: node.get("AllowedValues"),
			allowed_pattern: node.get("AllowedPattern"),
			min_length: node.get("MinLength"),
			max_length: node.get("MaxLength"),
			min_value: node.get("MinValue"),
			max_value: node.get("MaxValue"),
			no_echo: node.get("NoEcho"),
			constraint_description: node.get("ConstraintDescription"),
		},
	}
}

/// Conditions are bare expressions, so any entry shape is accepted
fn parse_conditions<'a>(
	root: &'a Node,
	errors: &mut Vec<ModelError>,
) -> HashMap<String, CfnCondition<'a>> {
	let Some((section_key, node)) = section(root, "Conditions") else {
		return HashMap::new();
	};

	mapping_section(section_key, node, errors)
		.unwrap_or_default()
		.iter()
		.map(|(key, expression)| {
			let condition = CfnCondition {
				key,
				expression,
				path: Path::root().child("Conditions").child(key.name.as_str()),
			};
			(key.name.clone(), condition)
		})
		.collect()
}

fn parse_mapping<'a>(key: &'a Key, node: &'a Node, path: Path) -> CfnMapping<'a> {
	let table = node
		.as_mapping()
		.unwrap_or_default()
		.iter()
		.filter_map(|(top_key, top_value)| {
			let second = top_value
				.as_mapping()?
				.iter()
				.map(|(k, v)| (k.name.clone(), v))
				.collect::<HashMap<_, _>>();
			Some((top_key.name.clone(), second))
		})
		.collect();

	CfnMapping {
		key,
		node,
		path,
		table,
	}
}

fn parse_output<'a>(key: &'a Key, node: &'a Node, path: Path) -> CfnOutput<'a> {
	CfnOutput {
		key,
		node,
		path,
		value: node.get("Value"),
		export: node.get("Export").and_then(|export| export.get("Name")),
		description: node.get("Description").and_then(Node::as_str),
		condition: node.get("Condition").and_then(Node::as_str),
	}
}

fn parse_rule<'a>(key: &'a Key, node: &'a Node, path: Path) -> CfnRule<'a> {
	let assertions_path = path.child("Assertions");
	let assertions = node
		.get("Assertions")
		.and_then(Node::as_sequence)
		.unwrap_or_default()
		.iter()
		.enumerate()
		.filter_map(|(i, assertion)| {
			Some(CfnAssertion {
				assert: assertion.get("Assert")?,
				description: assertion.get("AssertDescription").and_then(Node::as_str),
				path: assertions_path.child(i),
			})
		})
		.collect();

	CfnRule {
		key,
		node,
		path,
		rule_condition: node.get("RuleCondition"),
		assertions,
	}
}
