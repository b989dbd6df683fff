use std::fmt;

use crate::template::model::{CfnParameter, CfnResource, CfnTemplate};
use crate::template::node::{Node, NodeKind, Scalar};

/// Flow-style rendering; intrinsic invocations print as their shorthand tag
impl fmt::Display for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some((function, payload)) = self.intrinsic() {
			return write!(f, "!{} {}", function.tag(), payload);
		}

		match &self.kind {
			NodeKind::Scalar(Scalar::String(s)) => write!(f, "{s:?}"),
			NodeKind::Scalar(Scalar::Number(n)) => write!(f, "{n}"),
			NodeKind::Scalar(Scalar::Bool(b)) => write!(f, "{b}"),
			NodeKind::Scalar(Scalar::Null) => f.write_str("null"),
			NodeKind::Sequence(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{item}")?;
				}
				f.write_str("]")
			}
			NodeKind::Mapping(entries) => {
				f.write_str("{")?;
				for (i, (key, value)) in entries.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}: {value}", key.name)?;
				}
				f.write_str("}")
			}
		}
	}
}

fn sorted<'m, T>(items: impl IntoIterator<Item = (&'m String, &'m T)>) -> Vec<(&'m String, &'m T)> {
	let mut items: Vec<_> = items.into_iter().collect();
	items.sort_by_key(|(name, _)| *name);
	items
}

impl fmt::Display for CfnTemplate<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Template:")?;

		if let Some(version) = self.format_version {
			writeln!(f, "  AWSTemplateFormatVersion: {version}")?;
		}

		if let Some(transform) = &self.transform {
			let names: Vec<_> = transform.names().collect();
			writeln!(f, "  Transform: {}", names.join(", "))?;
		}

		if !self.parameters.is_empty() {
			writeln!(f, "  Parameters:")?;
			for (_, param) in sorted(&self.parameters) {
				writeln!(f, "    {param}")?;
			}
		}

		if !self.mappings.is_empty() {
			writeln!(f, "  Mappings:")?;
			for (name, mapping) in sorted(&self.mappings) {
				writeln!(f, "    {name}: {}", mapping.node)?;
			}
		}

		if !self.conditions.is_empty() {
			writeln!(f, "  Conditions:")?;
			for (name, condition) in sorted(&self.conditions) {
				writeln!(f, "    {name}: {}", condition.expression)?;
			}
		}

		if !self.resources.is_empty() {
			writeln!(f, "  Resources:")?;
			for (_, resource) in sorted(&self.resources) {
				for line in resource.to_string().lines() {
					writeln!(f, "    {line}")?;
				}
			}
		}

		if !self.for_each.is_empty() {
			writeln!(f, "  ForEach:")?;
			for (_, each) in sorted(&self.for_each) {
				writeln!(
					f,
					"    {}: {} in {} -> {}",
					each.loop_name, each.identifier, each.collection, each.template
				)?;
			}
		}

		if !self.outputs.is_empty() {
			writeln!(f, "  Outputs:")?;
			for (name, output) in sorted(&self.outputs) {
				match output.value {
					Some(value) => writeln!(f, "    {name}: {value}")?,
					None => writeln!(f, "    {name}: <no value>")?,
				}
			}
		}

		if !self.rules.is_empty() {
			writeln!(f, "  Rules:")?;
			for (name, rule) in sorted(&self.rules) {
				writeln!(f, "    {name}: {} assertion(s)", rule.assertions.len())?;
			}
		}

		for (key, _) in &self.unknown_sections {
			writeln!(f, "  {}: <unknown section>", key.name)?;
		}

		Ok(())
	}
}

impl fmt::Display for CfnParameter<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name(), self.parameter_type.unwrap_or("?"))?;
		if let Some(default) = self.default_value {
			write!(f, " = {default}")?;
		}
		Ok(())
	}
}

impl fmt::Display for CfnResource<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}:", self.logical_id())?;
		writeln!(f, "  Type: {}", self.resource_type.unwrap_or("?"))?;
		if let Some(condition) = self.condition {
			writeln!(f, "  Condition: {condition}")?;
		}
		if !self.depends_on.is_empty() {
			writeln!(f, "  DependsOn: {}", self.depends_on.join(", "))?;
		}
		if let Some(properties) = self.properties.and_then(Node::as_mapping) {
			writeln!(f, "  Properties:")?;
			// sorted for deterministic output
			let mut props: Vec<_> = properties.iter().collect();
			props.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));
			for (key, value) in props {
				writeln!(f, "    {}: {value}", key.name)?;
			}
		}
		Ok(())
	}
}
