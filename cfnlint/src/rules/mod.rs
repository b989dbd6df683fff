//! Reference rules and the default registry
//!
//! Every rule here is built on the model read API and the traversal
//! primitives only.

pub mod duplicates;
pub mod refs;
pub mod structure;
pub mod sub;
pub mod symbols;

pub use duplicates::DuplicateKeys;
pub use refs::RefExists;
pub use structure::TemplateStructure;
pub use sub::{SubNeeded, SubVariables};
pub use symbols::{PSEUDO_PARAMETERS, SymbolTable};

use crate::engine::{RegistryError, RuleSet};
use crate::template::model::CfnTemplate;
use crate::template::node::Node;

/// The rules a host gets unless it assembles its own set
pub fn default_rules() -> Result<RuleSet, RegistryError> {
	let mut rules = RuleSet::new();
	rules.register(TemplateStructure)?;
	rules.register(DuplicateKeys)?;
	rules.register(RefExists)?;
	rules.register(SubVariables)?;
	rules.register(SubNeeded)?;
	Ok(rules)
}

/// Prune predicate for free-form metadata, at template and resource level
pub(crate) fn metadata_pruner<'a>(
	template: &CfnTemplate<'a>,
) -> impl Fn(&Node) -> bool + Send + Sync + use<'a> {
	let metadata: Vec<&'a Node> = template
		.section("Metadata")
		.into_iter()
		.chain(template.resources.values().filter_map(|r| r.metadata))
		.collect();
	move |node| metadata.iter().any(|m| std::ptr::eq(*m, node))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_rules_register_in_order() {
		let rules = default_rules().unwrap();
		let ids: Vec<_> = rules.iter().map(|r| r.id()).collect();
		assert_eq!(ids, vec!["E1001", "E0010", "E1012", "E1019", "W1031"]);
		assert!(rules.iter().all(|r| !r.description().is_empty()));
	}
}
