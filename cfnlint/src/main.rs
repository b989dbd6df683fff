use std::path::PathBuf;
use std::{env, fs, process};

use cfnlint::engine::{Engine, Severity};
use cfnlint::rules::default_rules;
use cfnlint::template::{CfnTemplate, DEFAULT_MAX_DEPTH, Document, Format, ParseOptions};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
cfnlint - CloudFormation template linter

Usage:
  cfnlint [OPTIONS] FILE...

Options:
  --format json|yaml   Read every file as this syntax instead of sniffing it
  --max-depth N        Reject templates nested deeper than N (default 256)
  --list-rules         Print the registered rules and exit
  --dump               Print the template model instead of linting
  --version            Show version
  --help               Show this help";

struct Args {
	options: ParseOptions,
	list_rules: bool,
	dump: bool,
	files: Vec<PathBuf>,
}

fn usage_error(message: &str) -> ! {
	eprintln!("cfnlint: {message}\nTry 'cfnlint --help' for usage.");
	process::exit(2);
}

fn parse_args() -> Args {
	let mut args = env::args().skip(1);
	let mut parsed = Args {
		options: ParseOptions::default(),
		list_rules: false,
		dump: false,
		files: Vec::new(),
	};

	while let Some(arg) = args.next() {
		match arg.as_str() {
			"--version" | "-V" => {
				println!("cfnlint {}", env!("CARGO_PKG_VERSION"));
				process::exit(0);
			}
			"--help" | "-h" => {
				println!("{USAGE}");
				process::exit(0);
			}
			"--format" => {
				let value = args.next().unwrap_or_else(|| usage_error("--format needs a value"));
				match value.parse::<Format>() {
					Ok(format) => parsed.options.format = Some(format),
					Err(err) => usage_error(&err.to_string()),
				}
			}
			"--max-depth" => {
				let value = args
					.next()
					.unwrap_or_else(|| usage_error("--max-depth needs a value"));
				match value.parse::<usize>() {
					Ok(depth) if depth > 0 => parsed.options.max_depth = depth,
					_ => usage_error(&format!("invalid --max-depth '{value}'")),
				}
			}
			"--list-rules" => parsed.list_rules = true,
			"--dump" => parsed.dump = true,
			other if other.starts_with('-') => {
				usage_error(&format!("unrecognised argument '{other}'"));
			}
			file => parsed.files.push(PathBuf::from(file)),
		}
	}

	parsed
}

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();

	let args = parse_args();

	let rules = match default_rules() {
		Ok(rules) => rules,
		Err(err) => {
			eprintln!("cfnlint: {err}");
			process::exit(2);
		}
	};
	let engine = Engine::new(rules);

	if args.list_rules {
		for rule in engine.rules().iter() {
			println!("{} {}", rule.id(), rule.description());
		}
		return;
	}

	if args.files.is_empty() {
		usage_error("no template files given");
	}

	debug!(
		files = args.files.len(),
		max_depth = args.options.max_depth,
		default_max_depth = DEFAULT_MAX_DEPTH,
		"linting"
	);

	let mut failed = false;
	for path in &args.files {
		let source = match fs::read(path) {
			Ok(source) => source,
			Err(err) => {
				eprintln!("cfnlint: {}: {err}", path.display());
				failed = true;
				continue;
			}
		};

		if args.dump {
			match Document::parse(&source, &args.options) {
				Ok(document) => print!("{}", CfnTemplate::build(&document)),
				Err(err) => {
					eprintln!("{}:{}:{}: {}", path.display(), err.line, err.column, err.message);
					failed = true;
				}
			}
			continue;
		}

		for diagnostic in engine.lint(&source, &args.options) {
			failed |= diagnostic.severity == Severity::Error;
			println!("{}:{diagnostic}", path.display());
		}
	}

	if failed {
		process::exit(1);
	}
}
