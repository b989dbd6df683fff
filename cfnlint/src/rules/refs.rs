use crate::engine::{Match, Rule, RuleError};
use crate::rules::metadata_pruner;
use crate::rules::symbols::SymbolTable;
use crate::template::intrinsics::Intrinsic;
use crate::template::model::CfnTemplate;
use crate::traverse;

/// `Ref` must name a resource, a parameter or a pseudo parameter
pub struct RefExists;

impl Rule for RefExists {
	fn id(&self) -> &str {
		"E1012"
	}

	fn description(&self) -> &str {
		"Ref targets are declared"
	}

	fn matches(&self, template: &CfnTemplate<'_>) -> Result<Vec<Match>, RuleError> {
		let symbols = SymbolTable::from_template(template);

		let hits = traverse::find_all(template.root(), traverse::intrinsic(Intrinsic::Ref))
			.prune(metadata_pruner(template));

		let mut matches = Vec::new();
		for hit in hits {
			let Some((_, payload)) = hit.node.intrinsic() else {
				continue;
			};
			// nested functions and loop-expanded names are judged elsewhere
			let Some(target) = payload.as_str() else {
				continue;
			};
			if target.contains("${") || symbols.has_ref_target(target) {
				continue;
			}

			matches.push(Match::at_node(
				format!("Ref `{target}` does not refer to a resource or parameter"),
				payload,
				hit.path.child("Ref"),
			));
		}
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
		RefExists.matches(&CfnTemplate::build(&document)).unwrap()
	}

	#[test]
	fn unknown_target_is_reported_at_the_payload() {
		let matches = run("\
Parameters:
  Env:
    Type: String
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: !Ref Missing
      Tags:
        - Key: env
          Value: !Ref Env
        - Key: region
          Value: !Ref AWS::Region
");
		assert_eq!(matches.len(), 1);
		assert_eq!(matches[0].message, "Ref `Missing` does not refer to a resource or parameter");
		assert_eq!(matches[0].origin.map(|o| o.line), Some(8));
		assert_eq!(matches[0].path.to_string(), "Resources/Bucket/Properties/BucketName/Ref");
	}

	#[test]
	fn metadata_is_not_checked() {
		let matches = run("Metadata:\n  Doc: !Ref Anything\nResources:\n  B:\n    Type: AWS::S3::Bucket\n");
		assert!(matches.is_empty());
	}

	#[test]
	fn loop_identifiers_are_targets() {
		let matches = run("\
Transform: AWS::LanguageExtensions
Resources:
  Fn::ForEach::Topics:
    - Name
    - [a, b]
    - Topic${Name}:
        Type: AWS::SNS::Topic
        Properties:
          TopicName: !Ref Name
");
		assert!(matches.is_empty());
	}

	#[test]
	fn loop_generated_resources_are_targets() {
		let matches = run("\
Transform: AWS::LanguageExtensions
Resources:
  Fn::ForEach::Buckets:
    - Name
    - [A, B]
    - Bucket${Name}:
        Type: AWS::S3::Bucket
  Policy:
    Type: AWS::S3::BucketPolicy
    Properties:
      Bucket: !Ref BucketA
      Other: !Ref Queue
");
		assert_eq!(matches.len(), 1);
		assert!(matches[0].message.contains("`Queue`"));
	}

	#[test]
	fn quoted_target_is_reported_on_its_line() {
		let matches = run("Resources:\n  B:\n    Type: AWS::S3::Bucket\n    Properties:\n      BucketName: !Ref 'Missing'\n");
		assert_eq!(matches.len(), 1);
		assert_eq!(matches[0].origin, Some(Origin::new(5, 24)));
	}
}
