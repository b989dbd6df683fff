use crate::engine::{Match, Rule, RuleError};
use crate::template::model::CfnTemplate;
use crate::template::node::Path;

/// Top-level layout: required and unknown sections, plus every shape problem
/// the model builder ran into
pub struct TemplateStructure;

impl Rule for TemplateStructure {
	fn id(&self) -> &str {
		"E1001"
	}

	fn description(&self) -> &str {
		"Template sections and section entries have the expected shape"
	}

	fn matches(&self, template: &CfnTemplate<'_>) -> Result<Vec<Match>, RuleError> {
		let mut matches = Vec::new();

		if template.section("Resources").is_none() {
			matches.push(
				Match::new("Missing top level template section Resources", Path::root())
					.with_origin(template.root().origin),
			);
		}

		for (key, _) in &template.unknown_sections {
			matches.push(
				Match::new(
					format!("Top level template section {} is not valid", key.name),
					Path::root().child(key.name.as_str()),
				)
				.with_origin(key.origin),
			);
		}

		matches.extend(template.errors.iter().map(|error| {
			Match::new(error.message.clone(), error.path.clone()).with_origin(error.origin)
		}));

		Ok(matches)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::template::node::Origin;
	use crate::template::source::{Document, ParseOptions};

	fn run(text: &str) -> Vec<Match> {
		let document = Document::parse_str(text, &ParseOptions::default()).unwrap();
		TemplateStructure.matches(&CfnTemplate::build(&document)).unwrap()
	}

	#[test]
	fn valid_layout_has_no_matches() {
		assert!(run("Resources:\n  B:\n    Type: AWS::S3::Bucket\n").is_empty());
	}

	#[test]
	fn reports_missing_and_unknown_sections() {
		let matches = run("Description: x\nResource:\n  B:\n    Type: AWS::S3::Bucket\n");
		let messages: Vec<_> = matches.iter().map(|m| m.message.as_str()).collect();
		assert_eq!(
			messages,
			vec![
				"Missing top level template section Resources",
				"Top level template section Resource is not valid",
			]
		);
		assert_eq!(matches[1].origin, Some(Origin::new(2, 1)));
	}

	#[test]
	fn surfaces_model_errors() {
		let matches = run("Resources:\n  B: text\n");
		assert_eq!(matches.len(), 1);
		assert_eq!(matches[0].path.to_string(), "Resources/B");
		assert_eq!(matches[0].origin, Some(Origin::new(2, 6)));
	}
}
