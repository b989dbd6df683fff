//! `Fn::Sub` checks

use crate::engine::{Match, Rule, RuleError};
use crate::rules::metadata_pruner;
use crate::rules::symbols::SymbolTable;
use crate::template::intrinsics::Intrinsic;
use crate::template::model::CfnTemplate;
use crate::template::node::Node;
use crate::traverse::{self, has_sub_variable, sub_variables};

/// Split a `Fn::Sub` payload into its template string and optional variable
/// mapping: `"text"` or `["text", {Var: value}]`
pub fn sub_parts(payload: &Node) -> Option<(&str, Option<&Node>)> {
	if let Some(text) = payload.as_str() {
		return Some((text, None));
	}
	match payload.as_sequence()? {
		[text, variables] if variables.as_mapping().is_some() => {
			Some((text.as_str()?, Some(variables)))
		}
		_ => None,
	}
}

/// Variables in a substitution template must resolve
pub struct SubVariables;

impl Rule for SubVariables {
	fn id(&self) -> &str {
		"E1019"
	}

	fn description(&self) -> &str {
		"Fn::Sub variables refer to declared names"
	}

	fn matches(&self, template: &CfnTemplate<'_>) -> Result<Vec<Match>, RuleError> {
		let symbols = SymbolTable::from_template(template);

		let hits = traverse::find_all(template.root(), traverse::intrinsic(Intrinsic::Sub))
			.prune(metadata_pruner(template));

		let mut matches = Vec::new();
		for hit in hits {
			let Some((_, payload)) = hit.node.intrinsic() else {
				continue;
			};
			let path = hit.path.child(Intrinsic::Sub.key());

			let Some((text, variables)) = sub_parts(payload) else {
				matches.push(Match::at_node(
					"Fn::Sub must be a string or a list of a string and a mapping",
					payload,
					path,
				));
				continue;
			};

			let (text_node, text_path) = match payload.as_sequence() {
				Some([first, ..]) => (first, path.child(0usize)),
				_ => (payload, path),
			};

			for name in sub_variables(text) {
				let local = variables.is_some_and(|vars| vars.get(name).is_some());
				// `${Resource.Attribute}` is an implicit GetAtt
				let known = match name.split_once('.') {
					Some((resource, _)) => symbols.has_resource(resource),
					None => symbols.has_ref_target(name),
				};
				if local || known {
					continue;
				}

				matches.push(Match::at_node(
					format!("Fn::Sub variable `${{{name}}}` does not refer to a declared name"),
					text_node,
					text_path.clone(),
				));
			}
		}
		Ok(matches)
	}
}

/// `${Var}` written in a plain string that no `Fn::Sub` will expand
pub struct SubNeeded;

impl Rule for SubNeeded {
	fn id(&self) -> &str {
		"W1031"
	}

	fn description(&self) -> &str {
		"Strings with ${} variables are wrapped in Fn::Sub"
	}

	fn matches(&self, template: &CfnTemplate<'_>) -> Result<Vec<Match>, RuleError> {
		let in_metadata = metadata_pruner(template);

		let hits = traverse::find_all_with_context(
			template.root(),
			false,
			traverse::inside(Intrinsic::Sub),
			|node: &Node| node.as_str().is_some_and(has_sub_variable),
		)
		// included documents are expanded by the service, not by Fn::Sub
		.prune(move |node| in_metadata(node) || node.is_intrinsic(Intrinsic::Transform));

		let matches = hits
			.filter(|hit| !hit.context && !hit.node.is_dynamic_reference())
			.filter_map(|hit| {
				let text = hit.node.as_str()?;
				let variable = sub_variables(text).next()?;
				Some(Match::at_node(
					format!("Found an embedded parameter `${{{variable}}}` outside of an Fn::Sub"),
					hit.node,
					hit.path,
				))
			})
			.collect();
		Ok(matches)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::template::source::{Document, ParseOptions};

	fn run(rule: &dyn Rule, text: &str) -> Vec<Match> {
		let document = Document::parse_str(text, &ParseOptions::default()).unwrap();
		rule.matches(&CfnTemplate::build(&document)).unwrap()
	}

	const TEMPLATE: &str = "\
Parameters:
  Env:
    Type: String
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Metadata:
      Note: ${NotChecked}
    Properties:
      BucketName: !Sub '${Env}-${AWS::Region}-${Missing}'
      Tags:
        - Key: arn
          Value: !Sub ['${Prefix}:${Bucket.Arn}:${!Literal}', {Prefix: x}]
        - Key: plain
          Value: bucket-${Env}
        - Key: secret
          Value: '{{resolve:ssm:/app/${Env}}}'
";

	#[test]
	fn sub_parts_shapes() {
		let document = Document::parse_str(
			"A: text\nB: [text, {X: 1}]\nC: [text]\nD: [text, notamap]\n",
			&ParseOptions::default(),
		)
		.unwrap();
		let root = document.root();

		assert!(matches!(sub_parts(root.get("A").unwrap()), Some(("text", None))));
		assert!(matches!(sub_parts(root.get("B").unwrap()), Some(("text", Some(_)))));
		assert!(sub_parts(root.get("C").unwrap()).is_none());
		assert!(sub_parts(root.get("D").unwrap()).is_none());
	}

	#[test]
	fn undeclared_variables_are_reported() {
		let matches = run(&SubVariables, TEMPLATE);
		assert_eq!(matches.len(), 1);
		assert_eq!(
			matches[0].message,
			"Fn::Sub variable `${Missing}` does not refer to a declared name"
		);
		assert_eq!(
			matches[0].path.to_string(),
			"Resources/Bucket/Properties/BucketName/Fn::Sub"
		);
	}

	#[test]
	fn loop_generated_resources_have_attributes() {
		let matches = run(
			&SubVariables,
			"\
Resources:
  Fn::ForEach::Buckets:
    - Name
    - [A, B]
    - Bucket${Name}:
        Type: AWS::S3::Bucket
Outputs:
  Arn:
    Value: !Sub '${BucketA.Arn}'
",
		);
		assert!(matches.is_empty());
	}

	#[test]
	fn malformed_payload_is_reported() {
		let matches = run(&SubVariables, "Resources:\n  B:\n    Type: X\n    Properties:\n      P: !Sub [a, b, c]\n");
		assert_eq!(matches.len(), 1);
		assert!(matches[0].message.starts_with("Fn::Sub must be"));
	}

	#[test]
	fn plain_strings_with_variables_need_sub() {
		let matches = run(&SubNeeded, TEMPLATE);
		assert_eq!(matches.len(), 1);
		assert_eq!(
			matches[0].message,
			"Found an embedded parameter `${Env}` outside of an Fn::Sub"
		);
		assert_eq!(
			matches[0].path.to_string(),
			"Resources/Bucket/Properties/Tags/[1]/Value"
		);
		assert_eq!(matches[0].origin.map(|o| o.line), Some(15));
	}

	#[test]
	fn transform_payloads_are_skipped() {
		let matches = run(
			&SubNeeded,
			"Resources:\n  B:\n    Type: X\n    Properties:\n      P:\n        Fn::Transform:\n          Name: AWS::Include\n          Parameters:\n            Location: s3://bucket/${Env}.yaml\n",
		);
		assert!(matches.is_empty());
	}
}
