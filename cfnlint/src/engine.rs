//! Rule execution engine
//!
//! Rules are registered explicitly into a [`RuleSet`] and run in registration
//! order against one template model. A rule that errors or panics is reported
//! as a single diagnostic of its own; the remaining rules still run.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::template::model::CfnTemplate;
use crate::template::node::{Node, Origin, Path};
use crate::template::source::{Document, ParseOptions};

/// Reported when the template cannot be parsed at all
pub const PARSE_ERROR_ID: &str = "E0000";
/// Reported when a rule fails instead of producing matches
pub const RULE_ERROR_ID: &str = "E0002";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Error,
	Warning,
	Informational,
}

impl Severity {
	/// Severity is a property of the rule id: its first letter
	pub fn from_rule_id(id: &str) -> Option<Self> {
		match id.chars().next()? {
			'E' => Some(Severity::Error),
			'W' => Some(Severity::Warning),
			'I' => Some(Severity::Informational),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Severity::Error => "error",
			Severity::Warning => "warning",
			Severity::Informational => "informational",
		}
	}
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A finding produced by a rule, before the engine attaches the rule id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
	pub message: String,
	/// Position to report; when absent the node at `path` is used
	pub origin: Option<Origin>,
	pub path: Path,
}

impl Match {
	pub fn new(message: impl Into<String>, path: Path) -> Self {
		Self {
			message: message.into(),
			origin: None,
			path,
		}
	}

	/// A match positioned at a node
	pub fn at_node(message: impl Into<String>, node: &Node, path: Path) -> Self {
		Self::new(message, path).with_origin(node.origin)
	}

	pub fn with_origin(mut self, origin: Origin) -> Self {
		self.origin = Some(origin);
		self
	}
}

/// A finding attributed to a rule, ready for a formatter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
	pub rule_id: String,
	pub severity: Severity,
	pub message: String,
	pub line: u32,
	pub column: u32,
	pub path: Path,
}

impl Diagnostic {
	pub fn origin(&self) -> Origin {
		Origin::new(self.line, self.column)
	}
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{}: [{}] {} {}",
			self.line, self.column, self.severity, self.rule_id, self.message
		)
	}
}

/// Why a rule could not produce its matches
#[derive(Debug, Clone, Error)]
pub enum RuleError {
	#[error("{0}")]
	Failed(String),
	#[error("panicked: {0}")]
	Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
	#[error("rule `{0}` is already registered")]
	Duplicate(String),
	#[error("rule id `{0}` must start with E, W or I")]
	UnknownSeverity(String),
	#[error("rule id `{0}` is reserved by the engine")]
	Reserved(String),
}

/// A validation rule: inspects the model, reports matches.
///
/// Rules must not keep state between calls; one engine may run them from
/// several threads at once.
pub trait Rule: Send + Sync {
	/// Stable identifier; its first letter selects the severity
	fn id(&self) -> &str;

	fn description(&self) -> &str;

	fn matches(&self, template: &CfnTemplate<'_>) -> Result<Vec<Match>, RuleError>;
}

/// Append-only, explicitly assembled collection of rules
#[derive(Default)]
pub struct RuleSet {
	rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, rule: impl Rule + 'static) -> Result<(), RegistryError> {
		self.register_boxed(Box::new(rule))
	}

	pub fn register_boxed(&mut self, rule: Box<dyn Rule>) -> Result<(), RegistryError> {
		let id = rule.id();
		if id == PARSE_ERROR_ID || id == RULE_ERROR_ID {
			return Err(RegistryError::Reserved(id.to_string()));
		}
		if Severity::from_rule_id(id).is_none() {
			return Err(RegistryError::UnknownSeverity(id.to_string()));
		}
		if self.get(id).is_some() {
			return Err(RegistryError::Duplicate(id.to_string()));
		}

		debug!(rule = id, "registered rule");
		self.rules.push(rule);
		Ok(())
	}

	pub fn get(&self, id: &str) -> Option<&dyn Rule> {
		self.rules.iter().find(|r| r.id() == id).map(|r| r.as_ref())
	}

	pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
		self.rules.iter().map(|r| r.as_ref())
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}

impl fmt::Debug for RuleSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter().map(|r| r.id())).finish()
	}
}

/// Runs a fixed rule set. Holds no per-document state, so one engine can be
/// shared across threads.
#[derive(Debug)]
pub struct Engine {
	rules: RuleSet,
}

impl Engine {
	pub fn new(rules: RuleSet) -> Self {
		Self { rules }
	}

	pub fn rules(&self) -> &RuleSet {
		&self.rules
	}

	/// Parse, build and run. A parse failure is the only diagnostic reported.
	pub fn lint(&self, source: &[u8], options: &ParseOptions) -> Vec<Diagnostic> {
		match Document::parse(source, options) {
			Ok(document) => self.run(&CfnTemplate::build(&document)),
			Err(err) => {
				debug!(%err, "template did not parse");
				vec![Diagnostic {
					rule_id: PARSE_ERROR_ID.to_string(),
					severity: Severity::Error,
					message: err.message,
					line: err.line,
					column: err.column,
					path: Path::root(),
				}]
			}
		}
	}

	/// Run every rule once, in registration order
	pub fn run(&self, template: &CfnTemplate<'_>) -> Vec<Diagnostic> {
		let mut diagnostics = Vec::new();

		for rule in self.rules.iter() {
			let id = rule.id();
			// registration guarantees a severity
			let Some(severity) = Severity::from_rule_id(id) else {
				continue;
			};

			match run_isolated(rule, template) {
				Ok(matches) => {
					diagnostics.extend(matches.into_iter().map(|m| {
						let origin = m
							.origin
							.or_else(|| template.root().at(&m.path).map(|node| node.origin))
							.unwrap_or_default();
						Diagnostic {
							rule_id: id.to_string(),
							severity,
							message: m.message,
							line: origin.line,
							column: origin.column,
							path: m.path,
						}
					}));
				}
				Err(err) => {
					warn!(rule = id, %err, "rule failed");
					diagnostics.push(Diagnostic {
						rule_id: RULE_ERROR_ID.to_string(),
						severity: Severity::Error,
						message: format!("rule `{id}` failed: {err}"),
						line: 1,
						column: 1,
						path: Path::root(),
					});
				}
			}
		}

		debug!(
			rules = self.rules.len(),
			diagnostics = diagnostics.len(),
			"ran rules"
		);
		diagnostics
	}
}

fn run_isolated(rule: &dyn Rule, template: &CfnTemplate<'_>) -> Result<Vec<Match>, RuleError> {
	// a panicking rule only touched its own locals; the template is read-only
	match panic::catch_unwind(AssertUnwindSafe(|| rule.matches(template))) {
		Ok(result) => result,
		Err(payload) => {
			let cause = payload
				.downcast_ref::<&str>()
				.map(|s| s.to_string())
				.or_else(|| payload.downcast_ref::<String>().cloned())
				.unwrap_or_else(|| "unknown panic".to_string());
			Err(RuleError::Panicked(cause))
		}
	}
}
