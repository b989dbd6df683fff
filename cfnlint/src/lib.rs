//! Offline linter core for CloudFormation templates.
//!
//! Bytes go in through [`template::Document::parse`], a typed model comes out
//! of [`template::CfnTemplate::build`], and an [`engine::Engine`] runs
//! registered [`engine::Rule`]s over it. Rules search the tree with the
//! primitives in [`traverse`].

pub mod engine;
pub mod rules;
pub mod template;
pub mod traverse;

pub use engine::{Diagnostic, Engine, Match, RegistryError, Rule, RuleError, RuleSet, Severity};
pub use template::{CfnTemplate, Document, Format, ParseError, ParseOptions};
