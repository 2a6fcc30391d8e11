//! Value representation for the render tree
//!
//! A [`Value`] is a handle holding one share of a reference-counted node.
//! Inserting a value into an array or object stores another share of the
//! same node, so the inserting handle stays usable and the container keeps
//! the node alive on its own. The node is destroyed when the last share is
//! released, whether that happens through [`Value::dispose`] or `Drop`.
//!
//! ```
//! use stencil::Value;
//!
//! let root = Value::object();
//! {
//!     let name = Value::string("World");
//!     root.set("name", &name).unwrap();
//!     // `name` is dropped here; the object still holds its share.
//! }
//! assert_eq!(root.get("name").unwrap().as_str(), Some("World"));
//! ```

mod display;
mod impls;
mod node;
mod serialize;

pub(crate) use node::{Node, DEFAULT_MAX_DEPTH, NESTING_LIMIT};

use std::fmt;

/// The variant of a value node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Absent value, falsy in templates
    Null,
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// UTF-8 text
    String,
    /// Ordered sequence of values
    Array,
    /// String-keyed mapping, insertion ordered
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Owning handle to a shared value node.
///
/// Cloning a `Value` takes another share of the same node. A disposed
/// handle holds no share; every operation on it except [`Value::dispose`]
/// fails with [`StencilError::Disposed`](crate::StencilError::Disposed).
#[derive(Clone)]
pub struct Value {
    node: Option<Node>,
}

impl Value {
    pub(crate) fn from_node(node: Node) -> Self {
        Self { node: Some(node) }
    }

    pub(crate) fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }
}
