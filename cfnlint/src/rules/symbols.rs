//! Names a template declares, as seen by reference checks

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::template::model::{CfnTemplate, FOR_EACH_PREFIX};
use crate::template::node::Node;

/// `${Identifier}` or `&{Identifier}` in a `Fn::ForEach` output key
static LOOP_PLACEHOLDER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[$&]\{[^}]*\}").expect("placeholder pattern is valid"));

/// Pseudo parameters CloudFormation always provides
pub const PSEUDO_PARAMETERS: &[(&str, &str)] = &[
	("AWS::AccountId", "AWS account ID"),
	("AWS::NotificationARNs", "Notification ARNs"),
	("AWS::NoValue", "Removes resource property"),
	("AWS::Partition", "AWS partition (aws, aws-cn, aws-us-gov)"),
	("AWS::Region", "AWS region"),
	("AWS::StackId", "Stack ID"),
	("AWS::StackName", "Stack name"),
	("AWS::URLSuffix", "Domain suffix (amazonaws.com, amazonaws.com.cn)"),
];

pub fn is_pseudo_parameter(name: &str) -> bool {
	PSEUDO_PARAMETERS.iter().any(|(pseudo, _)| *pseudo == name)
}

/// Declared names of one template
#[derive(Debug)]
pub struct SymbolTable<'t, 'a> {
	template: &'t CfnTemplate<'a>,
	/// `Fn::ForEach` identifiers, usable as Ref targets inside loops
	loop_identifiers: HashSet<&'a str>,
	/// Logical IDs `Fn::ForEach` generates, one pattern per output key
	loop_resources: Vec<Regex>,
}

impl<'t, 'a> SymbolTable<'t, 'a> {
	pub fn from_template(template: &'t CfnTemplate<'a>) -> Self {
		let loop_identifiers = template
			.for_each
			.values()
			.filter_map(|each| each.identifier.as_str())
			.collect();

		let loop_resources = template
			.for_each
			.values()
			.flat_map(|each| loop_output_keys(each.template))
			.filter_map(loop_key_pattern)
			.collect();

		Self {
			template,
			loop_identifiers,
			loop_resources,
		}
	}

	/// Declared resource, or one a `Fn::ForEach` may generate
	pub fn has_resource(&self, logical_id: &str) -> bool {
		self.template.has_resource(logical_id)
			|| self.loop_resources.iter().any(|pattern| pattern.is_match(logical_id))
	}

	pub fn has_parameter(&self, name: &str) -> bool {
		self.template.has_parameter(name)
	}

	pub fn has_loop_identifier(&self, name: &str) -> bool {
		self.loop_identifiers.contains(name)
	}

	/// Resource, parameter, pseudo parameter or loop identifier
	pub fn has_ref_target(&self, target: &str) -> bool {
		self.has_resource(target)
			|| self.has_parameter(target)
			|| is_pseudo_parameter(target)
			|| self.has_loop_identifier(target)
	}
}

/// Output keys of a loop template, including those of nested loops
fn loop_output_keys(template: &Node) -> Vec<&str> {
	let mut keys = Vec::new();
	let mut pending = vec![template];

	while let Some(node) = pending.pop() {
		for (key, value) in node.as_mapping().unwrap_or_default() {
			if key.name.starts_with(FOR_EACH_PREFIX) {
				pending.extend(value.as_sequence().and_then(|parts| parts.get(2)));
			} else {
				keys.push(key.name.as_str());
			}
		}
	}

	keys
}

/// `Bucket${Name}` matches any logical ID with a non-empty name in its place
fn loop_key_pattern(key: &str) -> Option<Regex> {
	let mut pattern = String::from("^");
	let mut last = 0;
	for placeholder in LOOP_PLACEHOLDER.find_iter(key) {
		pattern.push_str(&regex::escape(&key[last..placeholder.start()]));
		pattern.push_str(".+");
		last = placeholder.end();
	}
	pattern.push_str(&regex::escape(&key[last..]));
	pattern.push('$');
	Regex::new(&pattern).ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::template::source::{Document, ParseOptions};

	#[test]
	fn ref_targets() {
		let document = Document::parse_str(
			"\
Parameters:
  Env:
    Type: String
Resources:
  Bucket:
    Type: AWS::S3::Bucket
  Fn::ForEach::Topics:
    - TopicName
    - [a, b]
    - Topic${TopicName}:
        Type: AWS::SNS::Topic
",
			&ParseOptions::default(),
		)
		.unwrap();
		let template = CfnTemplate::build(&document);
		let symbols = SymbolTable::from_template(&template);

		assert!(symbols.has_ref_target("Env"));
		assert!(symbols.has_ref_target("Bucket"));
		assert!(symbols.has_ref_target("AWS::Region"));
		assert!(symbols.has_ref_target("TopicName"));
		assert!(!symbols.has_ref_target("Missing"));
		assert!(!symbols.has_ref_target("AWS::Bogus"));
	}

	#[test]
	fn loop_generated_resources() {
		let document = Document::parse_str(
			"\
Resources:
  Fn::ForEach::Buckets:
    - Name
    - [A, B]
    - Bucket${Name}:
        Type: AWS::S3::Bucket
      Fn::ForEach::Queues:
        - Suffix
        - [x]
        - Queue${Name}&{Suffix}:
            Type: AWS::SQS::Queue
      Fixed:
        Type: AWS::SNS::Topic
",
			&ParseOptions::default(),
		)
		.unwrap();
		let template = CfnTemplate::build(&document);
		let symbols = SymbolTable::from_template(&template);

		assert!(symbols.has_resource("BucketA"));
		assert!(symbols.has_ref_target("BucketB"));
		assert!(symbols.has_resource("QueueAx"));
		assert!(symbols.has_resource("Fixed"));
		assert!(!symbols.has_resource("Bucket"));
		assert!(!symbols.has_resource("TopicA"));
	}
}
