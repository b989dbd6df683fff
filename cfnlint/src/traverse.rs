//! Generic traversal primitives
//!
//! Every rule searches the value tree the same way: a lazy pre-order walk in
//! document order that tests each node against a predicate, optionally
//! carrying a context value down the tree. The walk keeps an explicit stack,
//! so adversarial nesting cannot overflow the call stack, and it never
//! mutates the tree.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::template::intrinsics::Intrinsic;
use crate::template::node::{Node, NodeKind, Origin, Path};
use crate::template::source::DEFAULT_MAX_DEPTH;

/// A node that satisfied the predicate
#[derive(Debug, Clone)]
pub struct Hit<'a, C = ()> {
	pub node: &'a Node,
	/// Location of the node from the document root (or the walk's base path)
	pub path: Path,
	/// Context in force where the node sits, as computed by its ancestors
	pub context: C,
}

impl<C> Hit<'_, C> {
	pub fn origin(&self) -> Origin {
		self.node.origin
	}
}

struct Frame<'a, C> {
	node: &'a Node,
	path: Path,
	depth: usize,
	context: C,
}

type PruneFn<'a> = Box<dyn Fn(&Node) -> bool + Send + Sync + 'a>;

/// Lazy search over a subtree. Built by [`find_all`] or
/// [`find_all_with_context`]; configure with [`Walk::at`], [`Walk::prune`]
/// and [`Walk::max_depth`] before iterating.
pub struct Walk<'a, C, R, P> {
	stack: Vec<Frame<'a, C>>,
	rule: R,
	predicate: P,
	prune: Option<PruneFn<'a>>,
	max_depth: usize,
	warned: bool,
}

fn no_context(_: &(), _: &Node) {}

/// Every node under (and including) `root` that satisfies `predicate`, in
/// document order. Matches nested inside other matches are reported too.
pub fn find_all<'a, P>(root: &'a Node, predicate: P) -> Walk<'a, (), fn(&(), &Node), P>
where
	P: FnMut(&Node) -> bool,
{
	find_all_with_context(root, (), no_context as fn(&(), &Node), predicate)
}

/// Like [`find_all`], carrying a context value down the tree. The children of
/// a node receive `rule(&context, node)`; each hit reports the context its
/// ancestors established.
pub fn find_all_with_context<'a, C, R, P>(
	root: &'a Node,
	initial: C,
	rule: R,
	predicate: P,
) -> Walk<'a, C, R, P>
where
	C: Clone,
	R: FnMut(&C, &Node) -> C,
	P: FnMut(&Node) -> bool,
{
	Walk {
		stack: vec![Frame {
			node: root,
			path: Path::root(),
			depth: 0,
			context: initial,
		}],
		rule,
		predicate,
		prune: None,
		max_depth: DEFAULT_MAX_DEPTH,
		warned: false,
	}
}

impl<'a, C, R, P> Walk<'a, C, R, P> {
	/// Report paths relative to `base` instead of the walked node
	pub fn at(mut self, base: Path) -> Self {
		for frame in &mut self.stack {
			frame.path = base.clone();
		}
		self
	}

	/// Do not descend into nodes for which `prune` holds. The node itself is
	/// still tested.
	pub fn prune(mut self, prune: impl Fn(&Node) -> bool + Send + Sync + 'a) -> Self {
		self.prune = Some(Box::new(prune));
		self
	}

	pub fn max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;
		self
	}
}

impl<'a, C, R, P> Iterator for Walk<'a, C, R, P>
where
	C: Clone,
	R: FnMut(&C, &Node) -> C,
	P: FnMut(&Node) -> bool,
{
	type Item = Hit<'a, C>;

	fn next(&mut self) -> Option<Self::Item> {
		while let Some(Frame {
			node,
			path,
			depth,
			context,
		}) = self.stack.pop()
		{
			let pruned = self.prune.as_ref().is_some_and(|prune| prune(node));
			if !node.is_scalar() && !pruned {
				if depth >= self.max_depth {
					if !self.warned {
						warn!(max_depth = self.max_depth, path = %path, "walk depth limit reached, subtree skipped");
						self.warned = true;
					}
				} else {
					let inner = (self.rule)(&context, node);
					self.push_children(node, &path, depth + 1, inner);
				}
			}

			if (self.predicate)(node) {
				return Some(Hit {
					node,
					path,
					context,
				});
			}
		}
		None
	}
}

impl<'a, C: Clone, R, P> Walk<'a, C, R, P> {
	/// Push in reverse so the first child is popped first
	fn push_children(&mut self, node: &'a Node, path: &Path, depth: usize, context: C) {
		match &node.kind {
			NodeKind::Mapping(entries) => {
				for (key, value) in entries.iter().rev() {
					self.stack.push(Frame {
						node: value,
						path: path.child(key.name.as_str()),
						depth,
						context: context.clone(),
					});
				}
			}
			NodeKind::Sequence(items) => {
				for (i, item) in items.iter().enumerate().rev() {
					self.stack.push(Frame {
						node: item,
						path: path.child(i),
						depth,
						context: context.clone(),
					});
				}
			}
			NodeKind::Scalar(_) => {}
		}
	}
}

/// Invocations of one intrinsic function
pub fn intrinsic(function: Intrinsic) -> impl Fn(&Node) -> bool + Copy {
	move |node| node.is_intrinsic(function)
}

/// Invocations of any intrinsic function
pub fn any_intrinsic() -> impl Fn(&Node) -> bool + Copy {
	|node| node.intrinsic().is_some()
}

pub fn intrinsic_in(functions: &[Intrinsic]) -> impl Fn(&Node) -> bool + Copy + '_ {
	move |node| node.intrinsic().is_some_and(|(f, _)| functions.contains(&f))
}

/// String scalars the pattern matches
pub fn scalar_matching(pattern: &Regex) -> impl Fn(&Node) -> bool + Copy + '_ {
	move |node| node.as_str().is_some_and(|s| pattern.is_match(s))
}

/// String scalars holding a `{{resolve:...}}` dynamic reference
pub fn dynamic_reference() -> impl Fn(&Node) -> bool + Copy {
	|node| node.is_dynamic_reference()
}

/// Context rule: "somewhere inside an invocation of `function`"
pub fn inside(function: Intrinsic) -> impl Fn(&bool, &Node) -> bool + Copy {
	move |inside, node| *inside || node.is_intrinsic(function)
}

static SUB_VARIABLE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\$\{([^!}][^}]*)\}").expect("substitution pattern is valid"));

/// Variable names referenced by a substitution template. `${!Literal}` is an
/// escape and yields nothing.
pub fn sub_variables(template: &str) -> impl Iterator<Item = &str> {
	SUB_VARIABLE
		.captures_iter(template)
		.filter_map(|captures| captures.get(1))
		.map(|name| name.as_str().trim())
}

/// Whether a string contains a `${...}` substitution variable
pub fn has_sub_variable(text: &str) -> bool {
	SUB_VARIABLE.is_match(text)
}
