pub mod builder;
pub mod display;
pub mod intrinsics;
pub mod json;
pub mod model;
pub mod node;
pub mod source;
pub mod yaml;

#[cfg(test)]
mod tests;

pub use intrinsics::Intrinsic;
pub use model::{CfnTemplate, ModelError};
pub use node::{Key, Node, NodeKind, Number, Origin, Path, PathSegment, Scalar};
pub use source::{DEFAULT_MAX_DEPTH, Document, Format, ParseError, ParseOptions};
