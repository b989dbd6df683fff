//! Source reader: bytes in, position-tracked tree out
//!
//! No file I/O happens here; hosts hand over the bytes they loaded.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::template::node::{Node, Origin};
use crate::template::{json, yaml};

/// Nesting limit applied when the caller does not configure one
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Syntax a template is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
	/// Canonical map syntax
	Json,
	/// YAML with shorthand tags
	Yaml,
}

impl Format {
	/// Leading `{` or `[` means JSON, anything else is treated as YAML
	pub fn sniff(text: &str) -> Self {
		match text.trim_start_matches('\u{feff}').trim_start().chars().next() {
			Some('{') | Some('[') => Format::Json,
			_ => Format::Yaml,
		}
	}
}

impl fmt::Display for Format {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Format::Json => f.write_str("json"),
			Format::Yaml => f.write_str("yaml"),
		}
	}
}

#[derive(Debug, Clone, Error)]
#[error("unknown template format '{0}' (expected json or yaml)")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
	type Err = UnknownFormat;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"json" => Ok(Format::Json),
			"yaml" | "yml" => Ok(Format::Yaml),
			_ => Err(UnknownFormat(s.to_string())),
		}
	}
}

/// Options for reading a template
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
	/// Declared syntax; sniffed from the content when absent
	pub format: Option<Format>,
	/// Deepest nesting of sequences/mappings accepted before giving up
	pub max_depth: usize,
}

impl Default for ParseOptions {
	fn default() -> Self {
		Self {
			format: None,
			max_depth: DEFAULT_MAX_DEPTH,
		}
	}
}

impl ParseOptions {
	pub fn with_format(format: Format) -> Self {
		Self {
			format: Some(format),
			..Self::default()
		}
	}
}

/// Malformed source. Fatal for the document it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
	pub line: u32,
	pub column: u32,
	pub message: String,
}

impl ParseError {
	pub fn new(origin: Origin, message: impl Into<String>) -> Self {
		Self {
			line: origin.line,
			column: origin.column,
			message: message.into(),
		}
	}

	pub fn origin(&self) -> Origin {
		Origin::new(self.line, self.column)
	}
}

/// A parsed template: the owned root of the value tree
#[derive(Debug, Clone)]
pub struct Document {
	root: Node,
	format: Format,
}

impl Document {
	/// Parse raw template bytes
	pub fn parse(source: &[u8], options: &ParseOptions) -> Result<Self, ParseError> {
		let text = std::str::from_utf8(source).map_err(|err| {
			// report where the valid prefix ends
			let valid = &source[..err.valid_up_to()];
			let valid = std::str::from_utf8(valid).unwrap_or_default();
			let index = LineIndex::new(valid);
			ParseError::new(index.origin(valid.len()), "template is not valid UTF-8")
		})?;
		Self::parse_str(text, options)
	}

	/// Parse template text
	pub fn parse_str(text: &str, options: &ParseOptions) -> Result<Self, ParseError> {
		let text = text.strip_prefix('\u{feff}').unwrap_or(text);
		let format = options.format.unwrap_or_else(|| Format::sniff(text));

		check_nesting(text, format, options.max_depth)?;

		let root = match format {
			Format::Json => json::parse(text, options.max_depth)?,
			Format::Yaml => yaml::parse(text, options.max_depth)?,
		};

		if root.as_mapping().is_none() {
			return Err(ParseError::new(
				root.origin,
				format!("template must be a mapping, found {}", root.type_name()),
			));
		}

		debug!(%format, sections = root.keys().count(), "parsed template");
		Ok(Self { root, format })
	}

	pub fn root(&self) -> &Node {
		&self.root
	}

	pub fn format(&self) -> Format {
		self.format
	}
}

pub(crate) fn depth_exceeded(origin: Origin, max_depth: usize) -> ParseError {
	ParseError::new(
		origin,
		format!("template nesting exceeds the maximum depth of {max_depth}"),
	)
}

/// Byte offsets of line starts, for turning offsets into origins
pub(crate) struct LineIndex<'a> {
	text: &'a str,
	line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
	pub fn new(text: &'a str) -> Self {
		let line_starts = std::iter::once(0)
			.chain(text.match_indices('\n').map(|(i, _)| i + 1))
			.collect();
		Self { text, line_starts }
	}

	/// Origin of a byte offset, clamped to the text
	pub fn origin(&self, offset: usize) -> Origin {
		let mut offset = offset.min(self.text.len());
		while !self.text.is_char_boundary(offset) {
			offset -= 1;
		}
		let line = self.line_starts.partition_point(|&start| start <= offset);
		let line_start = self.line_starts[line - 1];
		let column = self.text[line_start..offset].chars().count() + 1;
		Origin::new(line as u32, column as u32)
	}

	/// Byte offset of a 1-based line and 0-based character column
	pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
		let start = *self.line_starts.get(line.checked_sub(1)?)?;
		let rest = &self.text[start..];
		match rest.char_indices().nth(column) {
			Some((i, _)) => Some(start + i),
			None if rest.chars().count() == column => Some(self.text.len()),
			None => None,
		}
	}

	pub fn text(&self) -> &'a str {
		self.text
	}
}

/// Lexical pre-scan of nesting depth, so that adversarial nesting is
/// rejected before any parser sees it.
///
/// Flow brackets count one level each. In YAML, every `- ` or `key:` that
/// opens a new indentation column also counts one level, and dedenting
/// closes levels again. Quoted strings, comments and block scalar bodies are
/// skipped. The count never exceeds the depth of the tree the parser would
/// build.
fn check_nesting(text: &str, format: Format, max_depth: usize) -> Result<(), ParseError> {
	let mut scan = NestingScan {
		yaml: format == Format::Yaml,
		max_depth,
		flow: 0,
		blocks: Vec::new(),
		block_scalar: None,
		quote: None,
		escaped: false,
		block_comment: false,
	};

	let mut start = 0;
	for line in text.split_inclusive('\n') {
		if let Err(offset) = scan.line(line, start) {
			let index = LineIndex::new(text);
			return Err(depth_exceeded(index.origin(offset), max_depth));
		}
		start += line.len();
	}

	Ok(())
}

struct NestingScan {
	yaml: bool,
	max_depth: usize,
	/// Open flow brackets
	flow: usize,
	/// Columns of the open YAML block collections
	blocks: Vec<usize>,
	/// Column a block scalar body must be indented past
	block_scalar: Option<usize>,
	quote: Option<char>,
	escaped: bool,
	block_comment: bool,
}

impl NestingScan {
	/// Scan one line starting at byte `start`; on failure returns the offset
	/// of the level that went too deep
	fn line(&mut self, line: &str, start: usize) -> Result<(), usize> {
		let mut from = 0;
		if self.yaml && self.quote.is_none() && self.flow == 0 {
			match self.block_line(line) {
				BlockLine::Skip => return Ok(()),
				BlockLine::Levels { columns, rest } => {
					for column in columns {
						if self.open_block(column) {
							return Err(start + column);
						}
					}
					from = rest;
				}
			}
		}
		self.flow_chars(&line[from..], start + from, from > 0)
	}

	/// Block structure at the start of a YAML line
	fn block_line(&mut self, line: &str) -> BlockLine {
		let content = line.trim_end_matches(['\n', '\r']);
		let indent = content.len() - content.trim_start_matches(' ').len();
		let body = &content[indent..];

		if body.is_empty() || body.starts_with('#') {
			return BlockLine::Skip;
		}
		if let Some(owner) = self.block_scalar {
			if indent > owner {
				return BlockLine::Skip;
			}
			self.block_scalar = None;
		}
		if indent == 0 && (body.starts_with("---") || body.starts_with("...")) {
			self.blocks.clear();
			return BlockLine::Skip;
		}

		let bytes = content.as_bytes();
		let mut columns = Vec::new();
		let mut at = indent;
		loop {
			let blank_after = bytes.get(at + 1).is_none_or(|b| b.is_ascii_whitespace());
			if matches!(bytes.get(at), Some(b'-' | b'?')) && blank_after {
				columns.push(at);
				at += 1;
				while bytes.get(at) == Some(&b' ') {
					at += 1;
				}
				continue;
			}
			if let Some(colon) = key_indicator(&content[at..]) {
				columns.push(at);
				at += colon + 1;
			}
			break;
		}

		if let Some(&owner) = columns.last()
			&& opens_block_scalar(&content[at..])
		{
			self.block_scalar = Some(owner);
		}

		BlockLine::Levels { columns, rest: at }
	}

	/// Enter the block collection at `column`; true when that is too deep
	fn open_block(&mut self, column: usize) -> bool {
		while self.blocks.last().is_some_and(|&open| open > column) {
			self.blocks.pop();
		}
		if self.blocks.last() != Some(&column) {
			self.blocks.push(column);
		}
		self.too_deep()
	}

	fn too_deep(&self) -> bool {
		self.blocks.len() + self.flow > self.max_depth
	}

	/// Count flow brackets outside strings and comments.
	///
	/// In YAML a quote only opens a string at the start of a token; JSON
	/// strings are always double quoted.
	fn flow_chars(&mut self, text: &str, start: usize, after_indicator: bool) -> Result<(), usize> {
		let yaml = self.yaml;
		let mut prev = if after_indicator { ' ' } else { '\n' };
		let mut chars = text.char_indices().peekable();

		while let Some((offset, c)) = chars.next() {
			if self.block_comment {
				if c == '*' && chars.peek().is_some_and(|&(_, next)| next == '/') {
					chars.next();
					self.block_comment = false;
				}
			} else if let Some(q) = self.quote {
				if self.escaped {
					self.escaped = false;
				} else if c == '\\' && q == '"' {
					self.escaped = true;
				} else if c == q {
					self.quote = None;
				}
			} else {
				let token_start = prev.is_whitespace() || matches!(prev, '[' | '{' | ',' | ':');
				match c {
					'"' if !yaml || token_start => self.quote = Some('"'),
					'\'' if yaml && token_start => self.quote = Some('\''),
					'#' if yaml && prev.is_whitespace() => return Ok(()),
					'/' if !yaml && chars.peek().is_some_and(|&(_, next)| next == '/') => return Ok(()),
					'/' if !yaml && chars.peek().is_some_and(|&(_, next)| next == '*') => {
						chars.next();
						self.block_comment = true;
					}
					'[' | '{' => {
						self.flow += 1;
						if self.too_deep() {
							return Err(start + offset);
						}
					}
					']' | '}' => self.flow = self.flow.saturating_sub(1),
					_ => {}
				}
			}
			prev = c;
		}

		Ok(())
	}
}

enum BlockLine {
	/// Blank, comment, document marker or block scalar body
	Skip,
	/// Columns of the block indicators on the line, and where the rest begins
	Levels { columns: Vec<usize>, rest: usize },
}

/// Byte index of the `:` ending a plain or quoted key at the start of `text`
fn key_indicator(text: &str) -> Option<usize> {
	let bytes = text.as_bytes();
	let is_indicator = |i: usize| {
		bytes.get(i) == Some(&b':') && bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace())
	};

	match bytes.first()? {
		q @ (b'"' | b'\'') => {
			let mut i = 1;
			while let Some(&b) = bytes.get(i) {
				if b == b'\\' && *q == b'"' {
					i += 2;
					continue;
				}
				if b == *q {
					// `''` is an escaped quote inside single quotes
					if *q == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
						i += 2;
						continue;
					}
					return is_indicator(i + 1).then_some(i + 1);
				}
				i += 1;
			}
			None
		}
		b'[' | b'{' | b'#' | b'&' | b'*' | b'!' | b'|' | b'>' | b'%' | b'@' | b'`' => None,
		_ => {
			let mut i = 0;
			while i < bytes.len() {
				if is_indicator(i) {
					return Some(i);
				}
				if bytes[i] == b'#' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
					return None;
				}
				i += 1;
			}
			None
		}
	}
}

/// A node value made of optional properties then `|` or `>` with its header
fn opens_block_scalar(value: &str) -> bool {
	let value = match value.find(" #") {
		Some(comment) => &value[..comment],
		None => value,
	};
	let mut tokens = value.split_whitespace().skip_while(|t| t.starts_with(['!', '&']));
	match (tokens.next(), tokens.next()) {
		(Some(header), None) => {
			header.starts_with(['|', '>'])
				&& header[1..].chars().all(|c| matches!(c, '+' | '-' | '0'..='9'))
		}
		_ => false,
	}
}
