// tests/fixtures.rs
use std::path::Path;
use std::sync::OnceLock;

use cfnlint::engine::{Diagnostic, Engine};
use cfnlint::rules::default_rules;
use cfnlint::template::ParseOptions;

static ENGINE: OnceLock<Engine> = OnceLock::new();

fn engine() -> &'static Engine {
	ENGINE.get_or_init(|| Engine::new(default_rules().expect("default rules register")))
}

fn lint(path: &Path) -> datatest_stable::Result<Vec<Diagnostic>> {
	let source = std::fs::read(path)?;
	Ok(engine().lint(&source, &ParseOptions::default()))
}

fn test_good_template(path: &Path) -> datatest_stable::Result<()> {
	let diags = lint(path)?;
	if diags.is_empty() {
		Ok(())
	} else {
		Err(format!("Unexpected diagnostics: {:?}", diags).into())
	}
}

fn test_bad_template(path: &Path) -> datatest_stable::Result<()> {
	let diags = lint(path)?;
	if diags.is_empty() {
		Err("Expected diagnostics but got none".into())
	} else {
		Ok(())
	}
}

datatest_stable::harness! {
	{ test = test_good_template, root = "tests/fixtures/good", pattern = r"\.yaml$|\.json$" },
	{ test = test_bad_template, root = "tests/fixtures/bad", pattern = r"\.yaml$|\.json$" },
}
