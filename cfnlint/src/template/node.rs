//! Position-tracking value tree
//!
//! Both source syntaxes converge on this representation. Every node, including
//! mapping keys and nodes synthesized from shorthand tags, carries the 1-based
//! line/column it originated at.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use serde::Serialize;

use crate::template::intrinsics::{self, Intrinsic};

/// 1-based line and column (in characters) where a token begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Origin {
	pub line: u32,
	pub column: u32,
}

impl Origin {
	pub const fn new(line: u32, column: u32) -> Self {
		Self { line, column }
	}
}

impl Default for Origin {
	fn default() -> Self {
		Self::new(1, 1)
	}
}

impl fmt::Display for Origin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
	Integer(i64),
	Float(f64),
}

impl Number {
	pub fn as_f64(&self) -> f64 {
		match self {
			Number::Integer(i) => *i as f64,
			Number::Float(f) => *f,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Number::Integer(i) => Some(*i),
			Number::Float(_) => None,
		}
	}
}

impl fmt::Display for Number {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Number::Integer(i) => write!(f, "{i}"),
			Number::Float(x) => write!(f, "{x}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
	String(String),
	Number(Number),
	Bool(bool),
	Null,
}

/// A mapping key, kept with its own origin so diagnostics can point at names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
	pub name: String,
	pub origin: Origin,
}

impl Key {
	pub fn new(name: impl Into<String>, origin: Origin) -> Self {
		Self {
			name: name.into(),
			origin,
		}
	}
}

#[derive(Debug, Clone)]
pub enum NodeKind {
	Scalar(Scalar),
	Sequence(Vec<Node>),
	/// Entries in document order. Duplicate keys are kept; lookups are last-wins.
	Mapping(Vec<(Key, Node)>),
}

#[derive(Debug, Clone)]
pub struct Node {
	pub kind: NodeKind,
	pub origin: Origin,
}

impl Node {
	pub fn new(kind: NodeKind, origin: Origin) -> Self {
		Self { kind, origin }
	}

	pub fn scalar(scalar: Scalar, origin: Origin) -> Self {
		Self::new(NodeKind::Scalar(scalar), origin)
	}

	pub fn string(value: impl Into<String>, origin: Origin) -> Self {
		Self::scalar(Scalar::String(value.into()), origin)
	}

	pub fn sequence(items: Vec<Node>, origin: Origin) -> Self {
		Self::new(NodeKind::Sequence(items), origin)
	}

	pub fn mapping(entries: Vec<(Key, Node)>, origin: Origin) -> Self {
		Self::new(NodeKind::Mapping(entries), origin)
	}

	pub fn as_scalar(&self) -> Option<&Scalar> {
		match &self.kind {
			NodeKind::Scalar(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Scalar(Scalar::String(s)) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match &self.kind {
			NodeKind::Scalar(Scalar::Bool(b)) => Some(*b),
			_ => None,
		}
	}

	pub fn as_number(&self) -> Option<Number> {
		match &self.kind {
			NodeKind::Scalar(Scalar::Number(n)) => Some(*n),
			_ => None,
		}
	}

	pub fn as_sequence(&self) -> Option<&[Node]> {
		match &self.kind {
			NodeKind::Sequence(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_mapping(&self) -> Option<&[(Key, Node)]> {
		match &self.kind {
			NodeKind::Mapping(entries) => Some(entries),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self.kind, NodeKind::Scalar(Scalar::Null))
	}

	pub fn is_scalar(&self) -> bool {
		matches!(self.kind, NodeKind::Scalar(_))
	}

	/// Human name of the node's shape, for messages
	pub fn type_name(&self) -> &'static str {
		match &self.kind {
			NodeKind::Scalar(Scalar::String(_)) => "string",
			NodeKind::Scalar(Scalar::Number(_)) => "number",
			NodeKind::Scalar(Scalar::Bool(_)) => "boolean",
			NodeKind::Scalar(Scalar::Null) => "null",
			NodeKind::Sequence(_) => "sequence",
			NodeKind::Mapping(_) => "mapping",
		}
	}

	/// Look up a mapping entry by key (last declaration wins)
	pub fn get_entry(&self, key: &str) -> Option<(&Key, &Node)> {
		self.as_mapping()?
			.iter()
			.rev()
			.find(|(k, _)| k.name == key)
			.map(|(k, v)| (k, v))
	}

	pub fn get(&self, key: &str) -> Option<&Node> {
		self.get_entry(key).map(|(_, v)| v)
	}

	pub fn keys(&self) -> impl Iterator<Item = &Key> {
		self.as_mapping().unwrap_or_default().iter().map(|(k, _)| k)
	}

	/// Follow a structural path down from this node
	pub fn at(&self, path: &Path) -> Option<&Node> {
		path.segments()
			.iter()
			.try_fold(self, |node, segment| match segment {
				PathSegment::Key(key) => node.get(key),
				PathSegment::Index(i) => node.as_sequence()?.get(*i),
			})
	}

	/// If this node is an intrinsic invocation, the function and its payload.
	///
	/// A mapping is an invocation iff it has exactly one key and that key is
	/// one of the canonical function names.
	pub fn intrinsic(&self) -> Option<(Intrinsic, &Node)> {
		match self.as_mapping()? {
			[(key, payload)] => Intrinsic::from_key(&key.name).map(|f| (f, payload)),
			_ => None,
		}
	}

	pub fn is_intrinsic(&self, function: Intrinsic) -> bool {
		self.intrinsic().is_some_and(|(f, _)| f == function)
	}

	/// String scalar holding a `{{resolve:...}}` dynamic reference
	pub fn is_dynamic_reference(&self) -> bool {
		self.as_str()
			.is_some_and(|s| intrinsics::DYNAMIC_REFERENCE.is_match(s))
	}

	/// Keys declared more than once in this mapping, as (first, repeated) pairs
	pub fn duplicate_keys(&self) -> Vec<(&Key, &Key)> {
		let entries = self.as_mapping().unwrap_or_default();
		let mut first_seen: HashMap<&str, &Key> = HashMap::with_capacity(entries.len());
		let mut duplicates = Vec::new();
		for (key, _) in entries {
			match first_seen.entry(key.name.as_str()) {
				Entry::Occupied(first) => duplicates.push((*first.get(), key)),
				Entry::Vacant(slot) => {
					slot.insert(key);
				}
			}
		}
		duplicates
	}

	/// Structural equality ignoring origins
	pub fn same_shape(&self, other: &Node) -> bool {
		match (&self.kind, &other.kind) {
			(NodeKind::Scalar(a), NodeKind::Scalar(b)) => a == b,
			(NodeKind::Sequence(a), NodeKind::Sequence(b)) => {
				a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
			}
			(NodeKind::Mapping(a), NodeKind::Mapping(b)) => {
				a.len() == b.len()
					&& a.iter()
						.zip(b)
						.all(|((ka, va), (kb, vb))| ka.name == kb.name && va.same_shape(vb))
			}
			_ => false,
		}
	}
}

/// One step of a structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
	Key(String),
	Index(usize),
}

impl fmt::Display for PathSegment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PathSegment::Key(k) => f.write_str(k),
			PathSegment::Index(i) => write!(f, "[{i}]"),
		}
	}
}

impl From<&str> for PathSegment {
	fn from(key: &str) -> Self {
		PathSegment::Key(key.to_string())
	}
}

impl From<String> for PathSegment {
	fn from(key: String) -> Self {
		PathSegment::Key(key)
	}
}

impl From<usize> for PathSegment {
	fn from(index: usize) -> Self {
		PathSegment::Index(index)
	}
}

/// Keys and indices locating a node from the document root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
	pub fn root() -> Self {
		Self::default()
	}

	pub fn segments(&self) -> &[PathSegment] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn push(&mut self, segment: impl Into<PathSegment>) {
		self.0.push(segment.into());
	}

	/// A new path one step below this one
	pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
		let mut path = self.clone();
		path.push(segment);
		path
	}

	pub fn starts_with(&self, prefix: &Path) -> bool {
		self.0.starts_with(&prefix.0)
	}

	/// The first key of the path, i.e. the top-level section it lives in
	pub fn section(&self) -> Option<&str> {
		match self.0.first() {
			Some(PathSegment::Key(k)) => Some(k),
			_ => None,
		}
	}
}

impl<S: Into<PathSegment>> FromIterator<S> for Path {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Path(iter.into_iter().map(Into::into).collect())
	}
}

impl fmt::Display for Path {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, segment) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str("/")?;
			}
			write!(f, "{segment}")?;
		}
		Ok(())
	}
}
