//! YAML reader and shorthand normalizer
//!
//! The tree is built straight from the parser's event stream, so every
//! mapping entry is kept in document order with its own position, repeated
//! keys included.
//!
//! Shorthand tags (`!Ref X`, `!Join [...]`) are rewritten into the canonical
//! single-key mapping (`{Ref: X}`, `{Fn::Join: [...]}`) while converting, so
//! consumers never see a tag. The payload keeps the shape the author wrote.

use std::borrow::Cow;
use std::collections::HashMap;

use saphyr::{Marker, Scalar as YamlScalar, ScalarStyle, ScanError, Tag};
use saphyr_parser::{Event, Parser, Span};

use crate::template::intrinsics;
use crate::template::node::{Key, Node, NodeKind, Number, Origin, Scalar};
use crate::template::source::{LineIndex, ParseError, depth_exceeded};

/// Nodes that alias expansion may add to one document
const ALIAS_EXPANSION_LIMIT: usize = 100_000;

/// Parse a YAML template (first document only) into the value tree
pub(crate) fn parse(text: &str, max_depth: usize) -> Result<Node, ParseError> {
	let index = LineIndex::new(text);
	let mut builder = TreeBuilder::new(&index, max_depth);

	for event in Parser::new_from_str(text) {
		let (event, span) = event.map_err(|err| scan_error(&err))?;
		if let Some(root) = builder.on_event(event, span)? {
			return Ok(root);
		}
	}

	Err(ParseError::new(Origin::default(), "template is empty"))
}

/// Convert a saphyr scan error (bad indentation, tabs, unterminated quotes...)
fn scan_error(err: &ScanError) -> ParseError {
	ParseError::new(position(err.marker()), format!("YAML parse error: {}", err.info()))
}

/// saphyr markers are 1-based lines and 0-based columns
fn position(marker: &Marker) -> Origin {
	Origin::new(marker.line() as u32, marker.col() as u32 + 1)
}

enum Collection {
	Sequence(Vec<Node>),
	Mapping {
		entries: Vec<(Key, Node)>,
		key: Option<Key>,
	},
}

/// A sequence or mapping whose end event has not arrived yet
struct Frame {
	collection: Collection,
	origin: Origin,
	shorthand: Option<Shorthand>,
	anchor: usize,
	depth: usize,
}

/// Canonical key and tag position of a `!Name` being desugared
struct Shorthand {
	key: String,
	origin: Origin,
}

struct Anchored {
	node: Node,
	size: usize,
	height: usize,
}

/// Where the text of a node begins: an optional tag, then the body
struct Lead {
	tag: Option<usize>,
	body: usize,
}

struct TreeBuilder<'i, 'a> {
	index: &'i LineIndex<'a>,
	max_depth: usize,
	stack: Vec<Frame>,
	anchors: HashMap<usize, Anchored>,
	expanded: usize,
	/// Byte offset just past the last event seen
	cursor: usize,
}

impl<'i, 'a> TreeBuilder<'i, 'a> {
	fn new(index: &'i LineIndex<'a>, max_depth: usize) -> Self {
		Self {
			index,
			max_depth,
			stack: Vec::new(),
			anchors: HashMap::new(),
			expanded: 0,
			cursor: 0,
		}
	}

	/// Feed one event; returns the root once the first document is complete
	fn on_event(&mut self, event: Event<'_>, span: Span) -> Result<Option<Node>, ParseError> {
		let result = match event {
			Event::Scalar(value, style, anchor, tag) => self.scalar(value, style, anchor, tag, &span),
			Event::SequenceStart(anchor, tag) => {
				self.open(Collection::Sequence(Vec::new()), anchor, tag, &span)
			}
			Event::MappingStart(anchor, tag) => self.open(
				Collection::Mapping {
					entries: Vec::new(),
					key: None,
				},
				anchor,
				tag,
				&span,
			),
			Event::SequenceEnd | Event::MappingEnd => self.close(),
			Event::Alias(id) => self.alias(id, &span),
			_ => Ok(None),
		};

		self.advance(&span.end);
		result
	}

	fn scalar<'e>(
		&mut self,
		value: Cow<'e, str>,
		style: ScalarStyle,
		anchor: usize,
		tag: Option<Cow<'e, Tag>>,
		span: &Span,
	) -> Result<Option<Node>, ParseError> {
		let lead = self.lead(span);
		let (shorthand, core) = self.classify(tag, &lead, span)?;

		// an empty scalar is reported at the next token; place it where it was written
		let empty = span.start.index() == span.end.index();
		let payload_origin = if empty {
			shorthand
				.as_ref()
				.map(|s| s.origin)
				.unwrap_or_else(|| self.index.origin(skip_separators(self.text(), self.cursor, false)))
		} else if matches!(style, ScalarStyle::Literal | ScalarStyle::Folded)
			&& self.text()[lead.body..].starts_with(['|', '>'])
		{
			// block scalars start at their indicator, not their first content line
			self.index.origin(lead.body)
		} else {
			position(&span.start)
		};

		let depth = self.depth() + usize::from(shorthand.is_some());
		if depth > self.max_depth {
			return Err(depth_exceeded(payload_origin, self.max_depth));
		}

		let scalar = if style == ScalarStyle::Plain && value.is_empty() && core.is_none() {
			Scalar::Null
		} else {
			match YamlScalar::parse_from_cow_and_metadata(value, style, core.as_ref()) {
				Some(scalar) => convert_scalar(scalar),
				None => return Err(ParseError::new(payload_origin, "invalid YAML value")),
			}
		};

		// a core schema tag (`!!str`) still moves the node start to the tag
		let origin = lead
			.tag
			.filter(|_| shorthand.is_none())
			.map(|offset| self.index.origin(offset))
			.unwrap_or(payload_origin);
		let node = wrap(Node::scalar(scalar, origin), shorthand);
		self.complete(node, anchor)
	}

	fn open(
		&mut self,
		collection: Collection,
		anchor: usize,
		tag: Option<Cow<'_, Tag>>,
		span: &Span,
	) -> Result<Option<Node>, ParseError> {
		let lead = self.lead(span);
		let (shorthand, _) = self.classify(tag, &lead, span)?;
		let origin = position(&span.start);

		let depth = self.depth() + usize::from(shorthand.is_some());
		if depth > self.max_depth {
			return Err(depth_exceeded(origin, self.max_depth));
		}

		self.stack.push(Frame {
			collection,
			origin,
			shorthand,
			anchor,
			depth,
		});
		Ok(None)
	}

	fn close(&mut self) -> Result<Option<Node>, ParseError> {
		let Some(frame) = self.stack.pop() else {
			return Ok(None);
		};

		let node = match frame.collection {
			Collection::Sequence(items) => Node::sequence(items, frame.origin),
			Collection::Mapping { entries, .. } => Node::mapping(entries, frame.origin),
		};
		let node = wrap(node, frame.shorthand);
		self.complete(node, frame.anchor)
	}

	fn alias(&mut self, id: usize, span: &Span) -> Result<Option<Node>, ParseError> {
		let origin = position(&span.start);
		let Some(anchored) = self.anchors.get(&id) else {
			return Err(ParseError::new(origin, "unknown YAML alias"));
		};

		let depth = self.depth();
		if depth + anchored.height > self.max_depth {
			return Err(depth_exceeded(origin, self.max_depth));
		}
		self.expanded += anchored.size;
		if self.expanded > ALIAS_EXPANSION_LIMIT {
			return Err(ParseError::new(
				origin,
				format!("YAML aliases expand to more than {ALIAS_EXPANSION_LIMIT} nodes"),
			));
		}

		let mut node = anchored.node.clone();
		node.origin = origin;
		self.attach(node)
	}

	fn complete(&mut self, node: Node, anchor: usize) -> Result<Option<Node>, ParseError> {
		if anchor > 0 {
			let (size, height) = measure(&node);
			self.anchors.insert(
				anchor,
				Anchored {
					node: node.clone(),
					size,
					height,
				},
			);
		}
		self.attach(node)
	}

	/// Hand a finished node to the open collection, or return it as the root
	fn attach(&mut self, node: Node) -> Result<Option<Node>, ParseError> {
		let Some(parent) = self.stack.last_mut() else {
			return Ok(Some(node));
		};

		match &mut parent.collection {
			Collection::Sequence(items) => items.push(node),
			Collection::Mapping { entries, key } => match key.take() {
				Some(key) => entries.push((key, node)),
				None => *key = Some(convert_key(node)?),
			},
		}
		Ok(None)
	}

	/// Tree depth of the next node
	fn depth(&self) -> usize {
		self.stack.last().map_or(0, |frame| frame.depth + 1)
	}

	/// Split a tag into a shorthand to desugar or a core schema tag to keep
	fn classify<'t>(
		&self,
		tag: Option<Cow<'t, Tag>>,
		lead: &Lead,
		span: &Span,
	) -> Result<(Option<Shorthand>, Option<Cow<'t, Tag>>), ParseError> {
		let Some(tag) = tag else {
			return Ok((None, None));
		};
		if tag.is_yaml_core_schema() {
			return Ok((None, Some(tag)));
		}

		let origin = lead
			.tag
			.map(|offset| self.index.origin(offset))
			.unwrap_or_else(|| position(&span.start));

		if !matches!(tag.handle.as_str(), "!" | "") {
			return Err(ParseError::new(
				origin,
				format!("unsupported YAML tag `{}{}`", tag.handle, tag.suffix),
			));
		}

		Ok((
			Some(Shorthand {
				key: intrinsics::canonical_key_for_tag(&tag.suffix),
				origin,
			}),
			None,
		))
	}

	/// Find the tag (if any) and body of the node whose content `span` covers.
	///
	/// saphyr spans cover a node's content token only, so properties written
	/// before it (`!Tag`, `&anchor`) are located by reading forward from the
	/// end of the previous event.
	fn lead(&self, span: &Span) -> Lead {
		let text = self.text();
		let limit = self
			.index
			.offset(span.start.line(), span.start.col())
			.unwrap_or(text.len());

		let mut tag = None;
		let mut at = skip_separators(text, self.cursor, true);
		while at < limit {
			match text.as_bytes()[at] {
				b'!' if tag.is_none() => tag = Some(at),
				b'&' => {}
				_ => break,
			}
			at = skip_separators(text, end_of_token(text, at), true);
		}

		Lead { tag, body: at }
	}

	fn advance(&mut self, end: &Marker) {
		if let Some(offset) = self.index.offset(end.line(), end.col()) {
			self.cursor = self.cursor.max(offset);
		}
	}

	fn text(&self) -> &'a str {
		self.index.text()
	}
}

/// Desugar `payload` into `{ "<canonical key>": payload }` positioned at the tag
fn wrap(payload: Node, shorthand: Option<Shorthand>) -> Node {
	match shorthand {
		Some(Shorthand { key, origin }) => Node::mapping(vec![(Key::new(key, origin), payload)], origin),
		None => payload,
	}
}

fn convert_scalar(scalar: YamlScalar<'_>) -> Scalar {
	match scalar {
		YamlScalar::Null => Scalar::Null,
		YamlScalar::Boolean(b) => Scalar::Bool(b),
		YamlScalar::Integer(i) => Scalar::Number(Number::Integer(i)),
		YamlScalar::FloatingPoint(f) => Scalar::Number(Number::Float(f.into_inner())),
		YamlScalar::String(s) => Scalar::String(s.into_owned()),
	}
}

/// Mapping keys become strings; scalar keys keep their resolved spelling
fn convert_key(node: Node) -> Result<Key, ParseError> {
	let name = match node.kind {
		NodeKind::Scalar(Scalar::String(s)) => s,
		NodeKind::Scalar(Scalar::Number(n)) => n.to_string(),
		NodeKind::Scalar(Scalar::Bool(b)) => b.to_string(),
		NodeKind::Scalar(Scalar::Null) => "null".to_string(),
		_ => return Err(ParseError::new(node.origin, "mapping keys must be scalars")),
	};
	Ok(Key::new(name, node.origin))
}

/// Node count and height of a subtree, without recursion
fn measure(node: &Node) -> (usize, usize) {
	let mut size = 0;
	let mut height = 0;
	let mut pending = vec![(node, 0usize)];

	while let Some((node, depth)) = pending.pop() {
		size += 1;
		height = height.max(depth);
		match &node.kind {
			NodeKind::Sequence(items) => pending.extend(items.iter().map(|item| (item, depth + 1))),
			NodeKind::Mapping(entries) => {
				pending.extend(entries.iter().map(|(_, value)| (value, depth + 1)));
			}
			NodeKind::Scalar(_) => {}
		}
	}

	(size, height)
}

/// Skip whitespace, comments and the indicators that separate a node from
/// its parent (`:`, `-`, `?`, `,`). With `newlines` false the scan stops at
/// the end of the line.
fn skip_separators(text: &str, from: usize, newlines: bool) -> usize {
	let bytes = text.as_bytes();
	let blank_after = |i: usize| bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace());
	let mut at = from;

	while let Some(&b) = bytes.get(at) {
		match b {
			b' ' | b'\t' | b'\r' => at += 1,
			b'\n' if newlines => at += 1,
			b'#' if newlines => {
				while bytes.get(at).is_some_and(|&b| b != b'\n') {
					at += 1;
				}
			}
			b',' => at += 1,
			b':' | b'-' | b'?' if blank_after(at) => at += 1,
			_ => break,
		}
	}

	at
}

/// End of a tag or anchor token
fn end_of_token(text: &str, from: usize) -> usize {
	text[from..]
		.find(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']' | '{' | '}'))
		.map_or(text.len(), |len| from + len)
}
