//! Render contexts
//!
//! A [`RenderContext`] wraps the root of a value tree for rendering. Creating
//! one takes a share of the root, seals every node reachable from it, and
//! converts the tree for the engine once. The same context can be rendered
//! any number of times, by any number of templates, from any thread.

use serde::Serialize;

use crate::builder::{ToValue, ValueBuilder};
use crate::engine::{self, EngineContext};
use crate::error::{HandleKind, Result, StencilError};
use crate::value::{Value, DEFAULT_MAX_DEPTH, NESTING_LIMIT};

const CREATE: &str = "Creating render context";

#[derive(Debug)]
struct Bound {
    root: Value,
    engine: EngineContext,
}

/// An immutable root wrapper passed to [`Template::render`](crate::Template::render).
///
/// ```
/// use stencil::{RenderContext, Template, Value};
///
/// let root = Value::object();
/// root.set("name", &Value::string("World")).unwrap();
///
/// let context = RenderContext::new(&root).unwrap();
/// let template = Template::parse("Hello, {{ name }}!").unwrap();
/// assert_eq!(template.render(&context).unwrap(), "Hello, World!");
///
/// // the tree is sealed now
/// assert!(root.set("late", &Value::null()).is_err());
/// ```
#[derive(Debug)]
pub struct RenderContext {
    bound: Option<Bound>,
}

impl RenderContext {
    /// Bind `root` for rendering.
    ///
    /// `root` must be live. The caller's handle stays valid and may be
    /// disposed right after; the context holds its own share. Trees nesting
    /// more than 128 containers deep are rejected with
    /// [`StencilError::DepthExceeded`].
    pub fn new(root: &Value) -> Result<Self> {
        Self::with_max_depth(root, DEFAULT_MAX_DEPTH)
    }

    /// Bind `root`, allowing up to `max_depth` levels of nested containers.
    ///
    /// Limits above 512 are lowered to 512. A rejected root is left
    /// unsealed and can still be modified.
    pub fn with_max_depth(root: &Value, max_depth: usize) -> Result<Self> {
        let root = root.share().map_err(|_| {
            StencilError::invalid_argument(CREATE, "ERROR: root value has been disposed")
        })?;
        let limit = max_depth.min(NESTING_LIMIT);
        if root.live()?.nests_deeper_than(limit) {
            return Err(StencilError::DepthExceeded { limit });
        }

        // every rejection happens above; sealing comes before conversion so
        // the engine copy matches the frozen tree
        root.seal()?;
        let engine = engine::context_make(&root).map_err(|fault| fault.into_error(CREATE))?;
        tracing::debug!(limit, "bound render context");
        Ok(Self {
            bound: Some(Bound { root, engine }),
        })
    }

    /// Convert `data` with default builder options and bind the result.
    pub fn from_data<T: ToValue + ?Sized>(data: &T) -> Result<Self> {
        Self::new(&crate::builder::to_value(data)?)
    }

    /// Convert `data` through serde and bind the result.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        Self::new(&ValueBuilder::new().build_serialize(data)?)
    }

    /// Release this context's share of the root. Idempotent.
    pub fn dispose(&mut self) {
        if self.bound.take().is_some() {
            tracing::trace!("released render context");
        }
    }

    /// Check if this context has been disposed
    pub fn is_disposed(&self) -> bool {
        self.bound.is_none()
    }

    /// A new handle to the (sealed) root.
    pub fn root(&self) -> Result<Value> {
        self.live()?.root.share()
    }

    pub(crate) fn engine(&self) -> Result<&EngineContext> {
        self.live().map(|bound| &bound.engine)
    }

    fn live(&self) -> Result<&Bound> {
        self.bound.as_ref().ok_or(StencilError::Disposed {
            handle: HandleKind::Context,
        })
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
