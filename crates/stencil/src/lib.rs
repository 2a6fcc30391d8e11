//! # Stencil
//!
//! Render Jinja-style templates against shared-ownership value trees.
//!
//! Stencil converts host data into a dynamically typed tree of
//! reference-counted nodes, seals it behind a [`RenderContext`], and renders
//! compiled [`Template`]s against it. Every handle can be released early with
//! `dispose` and is released on `Drop` otherwise; nodes live exactly as long
//! as their last share.
//!
//! ## Architecture
//!
//! - **Value**: reference-counted tree nodes (null, bool, int, float,
//!   string, array, object)
//! - **Builder**: host data to value trees, through [`ToValue`], [`Record`]
//!   field tables or `serde::Serialize`
//! - **Context**: sealed root wrapper, converted for the engine once
//! - **Template**: parsed once, rendered many times, from any thread
//! - **FFI**: a handle-based C ABI over all of the above
//!
//! ## Example
//!
//! ```
//! use stencil::{RenderContext, Template, Value};
//!
//! let root = Value::object();
//! let fruits = Value::array();
//! for name in ["Apple", "Banana", "Cherry"] {
//!     fruits.add(&Value::string(name)).unwrap();
//! }
//! root.set("fruits", &fruits).unwrap();
//!
//! let context = RenderContext::new(&root).unwrap();
//! let template = Template::parse("{% for f in fruits %}{{ f }} {% endfor %}").unwrap();
//! assert_eq!(template.render(&context).unwrap(), "Apple Banana Cherry ");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod context;
mod engine;
pub mod error;
pub mod ffi;
pub mod options;
pub mod template;
pub mod value;

// Re-export main types
pub use builder::{
    to_value, BuilderOptions, Converter, FieldPolicy, FieldSpec, FieldTable, Record, ToValue,
    ValueBuilder,
};
pub use context::RenderContext;
pub use error::{HandleKind, Result, Status, StencilError};
pub use options::{TemplateOptions, UndefinedPolicy};
pub use template::Template;
pub use value::{Value, ValueKind};

/// Stencil version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_handles_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Value>();
        assert_send_sync::<RenderContext>();
        assert_send_sync::<Template>();
    }
}
