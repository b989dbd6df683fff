use crate::template::intrinsics::{INTRINSICS, Intrinsic};
use crate::template::model::CfnTransform;
use crate::template::node::{Node, Origin, Path};
use crate::template::source::{Document, Format, ParseOptions};
use crate::template::CfnTemplate;

fn parse(text: &str) -> Document {
	Document::parse_str(text, &ParseOptions::default()).unwrap()
}

fn yaml_value(text: &str) -> Node {
	parse(text).root().get("V").unwrap().clone()
}

#[test]
fn shorthand_and_canonical_forms_have_the_same_shape() {
	for def in INTRINSICS {
		let short = yaml_value(&format!("V: !{} A\n", def.yaml_tag));
		let long = yaml_value(&format!("V:\n  {}: A\n", def.json_key));

		assert!(short.same_shape(&long), "!{} vs {}", def.yaml_tag, def.json_key);
		assert_eq!(short.intrinsic().map(|(f, _)| f), Some(def.kind));
		assert_eq!(long.intrinsic().map(|(f, _)| f), Some(def.kind));
	}
}

#[test]
fn json_and_yaml_produce_the_same_tree() {
	let yaml = parse(
		"Resources:\n  B:\n    Type: AWS::S3::Bucket\n    Properties:\n      Name: !Join ['-', [!Ref P, x]]\n",
	);
	let json = parse(
		r#"{"Resources": {"B": {"Type": "AWS::S3::Bucket", "Properties": {"Name": {"Fn::Join": ["-", [{"Ref": "P"}, "x"]]}}}}}"#,
	);

	assert_eq!(yaml.format(), Format::Yaml);
	assert_eq!(json.format(), Format::Json);
	assert!(yaml.root().same_shape(json.root()));
}

#[test]
fn payload_is_kept_as_written() {
	let dotted = yaml_value("V: !GetAtt Bucket.Arn\n");
	let (_, payload) = dotted.intrinsic().unwrap();
	assert_eq!(payload.as_str(), Some("Bucket.Arn"));

	let listed = yaml_value("V: !GetAtt [Bucket, Arn]\n");
	let (_, payload) = listed.intrinsic().unwrap();
	assert_eq!(payload.as_sequence().map(|items| items.len()), Some(2));
}

#[test]
fn unknown_tag_normalizes_but_is_not_an_intrinsic() {
	let node = yaml_value("V: !Bogus A\n");
	assert_eq!(node.keys().next().map(|k| k.name.as_str()), Some("Fn::Bogus"));
	assert!(node.intrinsic().is_none());
}

#[test]
fn nested_shorthand_is_normalized() {
	let node = yaml_value("V: !If [Cond, !Ref A, !Sub '${B}-x']\n");
	let (function, payload) = node.intrinsic().unwrap();
	assert_eq!(function, Intrinsic::If);

	let items = payload.as_sequence().unwrap();
	assert!(items[1].is_intrinsic(Intrinsic::Ref));
	assert!(items[2].is_intrinsic(Intrinsic::Sub));
}

#[test]
fn synthesized_nodes_take_the_tag_position() {
	let text = "\
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: !Ref Name
";
	let document = parse(text);
	let properties = document
		.root()
		.at(&["Resources", "Bucket", "Properties"].into_iter().collect())
		.unwrap();

	let (key, value) = properties.get_entry("BucketName").unwrap();
	assert_eq!(key.origin, Origin::new(5, 7));
	assert_eq!(value.origin, Origin::new(5, 19));

	let (ref_key, _) = value.as_mapping().unwrap().first().unwrap();
	assert_eq!(ref_key.name, "Ref");
	assert_eq!(ref_key.origin, Origin::new(5, 19));
}

#[test]
fn tag_position_before_flow_payload() {
	let document = parse("Outputs:\n  O:\n    Value: !Join ['', [a, b]]\n");
	let value = document
		.root()
		.at(&["Outputs", "O", "Value"].into_iter().collect())
		.unwrap();
	assert_eq!(value.origin, Origin::new(3, 12));
}

#[test]
fn plain_keys_have_their_own_positions() {
	let document = parse("Resources:\n  MyBucket:\n    Type: AWS::S3::Bucket\n");
	let template = CfnTemplate::build(&document);

	let bucket = &template.resources["MyBucket"];
	assert_eq!(bucket.origin(), Origin::new(2, 3));
	assert_eq!(bucket.path.to_string(), "Resources/MyBucket");
}

#[test]
fn yaml_syntax_errors_are_fatal() {
	let err = Document::parse_str("Resources:\n  A: \"open\n", &ParseOptions::default()).unwrap_err();
	assert!(err.message.starts_with("YAML parse error"), "{}", err.message);
}

#[test]
fn empty_yaml_is_an_error() {
	let err = Document::parse_str("", &ParseOptions::default()).unwrap_err();
	assert_eq!(err.message, "template is empty");
	assert_eq!(err.origin(), Origin::new(1, 1));
}

#[test]
fn declared_format_overrides_sniffing() {
	let options = ParseOptions::with_format(Format::Yaml);
	// JSON is valid YAML flow syntax
	let document = Document::parse_str(r#"{"Resources": {}}"#, &options).unwrap();
	assert_eq!(document.format(), Format::Yaml);
}

#[test]
fn only_the_first_yaml_document_is_used() {
	let document = parse("Description: one\n---\nDescription: two\n");
	assert_eq!(document.root().get("Description").and_then(Node::as_str), Some("one"));
}

#[test]
fn scalar_keys_are_stringified() {
	let root = parse("Mappings:\n  M:\n    1: {true: x}\n").root().clone();
	let mapping = root.at(&["Mappings", "M"].into_iter().collect()).unwrap();
	let inner = mapping.get("1").unwrap();
	assert_eq!(inner.get("true").and_then(Node::as_str), Some("x"));
}

#[test]
fn model_collects_every_section() {
	let document = parse(
		"\
AWSTemplateFormatVersion: '2010-09-09'
Description: sample
Transform: [AWS::Serverless-2016-10-31, {Name: AWS::Include, Parameters: {Location: s3://x}}]
Parameters:
  Env:
    Type: String
    Default: dev
    AllowedValues: [dev, prod]
Mappings:
  Regions:
    us-east-1:
      Ami: ami-123
Conditions:
  IsProd: !Equals [!Ref Env, prod]
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Condition: IsProd
    DependsOn: Queue
  Queue:
    Type: AWS::SQS::Queue
    DependsOn: [Bucket, Other]
Outputs:
  Name:
    Value: !Ref Bucket
    Export:
      Name: bucket-name
Rules:
  ProdOnly:
    RuleCondition: !Equals [!Ref Env, prod]
    Assertions:
      - Assert: !Not [!Equals [!Ref Env, dev]]
        AssertDescription: no dev
Custom: kept
",
	);
	let template = CfnTemplate::build(&document);

	assert!(template.errors.is_empty(), "{:?}", template.errors);
	assert_eq!(template.format_version, Some("2010-09-09"));
	assert_eq!(template.description, Some("sample"));
	assert!(matches!(template.transform, Some(CfnTransform::List(_))));
	assert!(template.has_transform("AWS::Include"));
	assert!(template.has_transform("AWS::Serverless-2016-10-31"));

	let env = &template.parameters["Env"];
	assert_eq!(env.parameter_type, Some("String"));
	assert_eq!(env.default_value.and_then(Node::as_str), Some("dev"));
	assert!(env.constraints.allowed_values.is_some());

	assert_eq!(
		template.mappings["Regions"].lookup("us-east-1", "Ami").and_then(Node::as_str),
		Some("ami-123")
	);
	assert!(template.conditions["IsProd"].expression.is_intrinsic(Intrinsic::Equals));

	let bucket = &template.resources["Bucket"];
	assert_eq!(bucket.resource_type, Some("AWS::S3::Bucket"));
	assert_eq!(bucket.condition, Some("IsProd"));
	assert_eq!(bucket.depends_on, vec!["Queue"]);
	assert_eq!(template.resources["Queue"].depends_on, vec!["Bucket", "Other"]);

	let output = &template.outputs["Name"];
	assert!(output.value.is_some_and(|v| v.is_intrinsic(Intrinsic::Ref)));
	assert_eq!(output.export.and_then(Node::as_str), Some("bucket-name"));

	let rule = &template.rules["ProdOnly"];
	assert!(rule.rule_condition.is_some());
	assert_eq!(rule.assertions.len(), 1);
	assert_eq!(rule.assertions[0].description, Some("no dev"));
	assert_eq!(rule.assertions[0].path.to_string(), "Rules/ProdOnly/Assertions/[0]");

	assert_eq!(template.unknown_sections.len(), 1);
	assert_eq!(template.unknown_sections[0].0.name, "Custom");
}

#[test]
fn malformed_section_does_not_stop_the_others() {
	let document = parse(
		"\
Parameters:
  Env:
    Type: String
Conditions:
  Always: !Equals [a, a]
Resources: not-a-mapping
Outputs:
  Out:
    Value: !Ref Env
",
	);
	let template = CfnTemplate::build(&document);

	assert_eq!(template.errors.len(), 1);
	let error = &template.errors[0];
	assert_eq!(error.path, Path::root().child("Resources"));
	assert_eq!(error.origin, Origin::new(6, 12));
	assert!(error.message.contains("mapping"));

	assert!(template.resources.is_empty());
	assert!(template.has_parameter("Env"));
	assert!(template.has_condition("Always"));
	assert!(template.has_output("Out"));
}

#[test]
fn malformed_entries_are_skipped() {
	let document = parse(
		"\
Resources:
  Good:
    Type: AWS::S3::Bucket
  Bad: [1, 2]
  Odd:
    Type: [not, a, string]
",
	);
	let template = CfnTemplate::build(&document);

	assert!(template.has_resource("Good"));
	assert!(!template.has_resource("Bad"));
	assert_eq!(template.errors.len(), 1);
	assert_eq!(template.errors[0].path.to_string(), "Resources/Bad");

	// wrong field types are left for rules to judge
	assert!(template.has_resource("Odd"));
	assert_eq!(template.resources["Odd"].resource_type, None);
}

#[test]
fn ref_targets_are_not_declarations() {
	let document = parse(
		"Resources: {B: {Type: AWS::S3::Bucket, Properties: {BucketName: {Ref: X}}}}",
	);
	let template = CfnTemplate::build(&document);

	assert!(template.has_resource("B"));
	assert!(!template.has_resource("X"));
	assert!(!template.has_parameter("X"));
}

#[test]
fn for_each_resources_are_kept_apart() {
	let document = parse(
		"\
Transform: AWS::LanguageExtensions
Resources:
  Fn::ForEach::Buckets:
    - Name
    - [A, B]
    - Bucket${Name}:
        Type: AWS::S3::Bucket
  Plain:
    Type: AWS::SNS::Topic
",
	);
	let template = CfnTemplate::build(&document);

	assert!(template.errors.is_empty(), "{:?}", template.errors);
	assert!(matches!(template.transform, Some(CfnTransform::Single("AWS::LanguageExtensions"))));
	assert_eq!(template.resources.len(), 1);
	assert!(template.has_resource("Plain"));
	assert!(!template.has_resource("Fn::ForEach::Buckets"));

	let each = &template.for_each["Fn::ForEach::Buckets"];
	assert_eq!(each.loop_name, "Buckets");
	assert_eq!(each.identifier.as_str(), Some("Name"));
	assert_eq!(each.collection.as_sequence().map(|c| c.len()), Some(2));
	assert!(each.template.get("Bucket${Name}").is_some());
}

#[test]
fn malformed_for_each_is_reported() {
	let document = parse("Resources:\n  Fn::ForEach::Loop: [only, two]\n");
	let template = CfnTemplate::build(&document);

	assert!(template.for_each.is_empty());
	assert_eq!(template.errors.len(), 1);
	assert_eq!(template.errors[0].path.to_string(), "Resources/Fn::ForEach::Loop");
}

#[test]
fn duplicate_names_are_last_wins() {
	let document = parse(
		r#"{"Resources": {"A": {"Type": "First"}, "A": {"Type": "Second"}}}"#,
	);
	let template = CfnTemplate::build(&document);

	assert_eq!(template.resources.len(), 1);
	assert_eq!(template.resources["A"].resource_type, Some("Second"));
	assert!(template.errors.is_empty());
}

#[test]
fn yaml_duplicate_names_keep_their_own_keys() {
	let document = parse("Resources:\n  A:\n    Type: First\n  A:\n    Type: Second\n");
	let resources = document.root().get("Resources").unwrap();
	assert_eq!(resources.as_mapping().map(|entries| entries.len()), Some(2));

	let template = CfnTemplate::build(&document);
	assert_eq!(template.resources["A"].resource_type, Some("Second"));
	assert_eq!(template.resources["A"].origin(), Origin::new(4, 3));
}

#[test]
fn wrong_scalar_sections_are_reported() {
	let document = parse("Description: [a]\nTransform: {Name: x}\nMetadata: text\nResources: {}\n");
	let template = CfnTemplate::build(&document);

	assert_eq!(template.description, None);
	assert!(template.transform.is_none());
	assert!(template.metadata.is_none());
	let paths: Vec<_> = template.errors.iter().map(|e| e.path.to_string()).collect();
	assert_eq!(paths, vec!["Description", "Metadata", "Transform"]);
}

#[test]
fn node_display_uses_shorthand() {
	let node = yaml_value("V: {Name: !Sub '${A}-x', Items: [1, true, null]}\n");
	assert_eq!(node.to_string(), r#"{Name: !Sub "${A}-x", Items: [1, true, null]}"#);
}

#[test]
fn template_display_lists_sections() {
	let document = parse(
		"Parameters:\n  Env:\n    Type: String\nResources:\n  B:\n    Type: AWS::S3::Bucket\n    Properties:\n      Name: !Ref Env\n",
	);
	let rendered = CfnTemplate::build(&document).to_string();

	assert!(rendered.starts_with("Template:\n"));
	assert!(rendered.contains("    Env (String)\n"));
	assert!(rendered.contains("    B:\n      Type: AWS::S3::Bucket\n"));
	assert!(rendered.contains("        Name: !Ref \"Env\"\n"));
}
