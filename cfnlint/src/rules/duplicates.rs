use crate::engine::{Match, Rule, RuleError};
use crate::template::model::CfnTemplate;
use crate::traverse;

/// A mapping declares the same key twice; only the last one takes effect
pub struct DuplicateKeys;

impl Rule for DuplicateKeys {
	fn id(&self) -> &str {
		"E0010"
	}

	fn description(&self) -> &str {
		"Mapping keys are unique"
	}

	fn matches(&self, template: &CfnTemplate<'_>) -> Result<Vec<Match>, RuleError> {
		let mappings = traverse::find_all(template.root(), |node| node.as_mapping().is_some());

		let mut matches = Vec::new();
		for hit in mappings {
			for (first, repeated) in hit.node.duplicate_keys() {
				matches.push(
					Match::new(
						format!(
							"Duplicate key `{}`, first declared at line {} column {}",
							repeated.name, first.origin.line, first.origin.column
						),
						hit.path.child(repeated.name.as_str()),
					)
					.with_origin(repeated.origin),
				);
			}
		}
		Ok(matches)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::template::node::Origin;
	use crate::template::source::{Document, ParseOptions};

	#[test]
	fn reports_each_repeated_key() {
		let document = Document::parse_str(
			r#"{
  "Resources": {
    "A": {"Type": "AWS::S3::Bucket", "Type": "AWS::SNS::Topic"},
    "A": {"Type": "AWS::SQS::Queue"}
  }
}"#,
			&ParseOptions::default(),
		)
		.unwrap();
		let matches = DuplicateKeys.matches(&CfnTemplate::build(&document)).unwrap();

		let found: Vec<_> = matches.iter().map(|m| (m.path.to_string(), m.origin)).collect();
		assert_eq!(
			found,
			vec![
				("Resources/A".to_string(), Some(Origin::new(4, 5))),
				("Resources/A/Type".to_string(), Some(Origin::new(3, 38))),
			]
		);
		assert!(matches[0].message.contains("line 3 column 5"));
	}

	#[test]
	fn yaml_repeats_are_reported_at_the_second_key() {
		let document = Document::parse_str(
			"Resources:\n  A:\n    Type: AWS::S3::Bucket\n  A:\n    Type: AWS::SNS::Topic\n  A:\n    Type: AWS::SQS::Queue\n",
			&ParseOptions::default(),
		)
		.unwrap();
		let matches = DuplicateKeys.matches(&CfnTemplate::build(&document)).unwrap();

		let found: Vec<_> = matches.iter().map(|m| m.origin).collect();
		assert_eq!(found, vec![Some(Origin::new(4, 3)), Some(Origin::new(6, 3))]);
		assert!(matches.iter().all(|m| m.message.contains("line 2 column 3")));
	}
}
