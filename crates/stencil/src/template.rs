//! Compiled templates
//!
//! A [`Template`] is parsed once and rendered any number of times. It is
//! independent of any value or context lifetime, and a single template may
//! be rendered concurrently from several threads.

use serde::Serialize;

use crate::builder::ToValue;
use crate::context::RenderContext;
use crate::engine::{self, Compiled};
use crate::error::{HandleKind, Result, StencilError};
use crate::options::TemplateOptions;

const PARSE: &str = "Parsing template";
const RENDER: &str = "Rendering template";
const RENDER_JSON: &str = "Rendering template with JSON";

/// A parsed template handle.
///
/// ```
/// use stencil::Template;
///
/// let template = Template::parse("{% for x in items %}{{ x }}{% endfor %}").unwrap();
/// let output = template.render_json(r#"{"items":[1,2,3]}"#).unwrap();
/// assert_eq!(output, "123");
/// ```
#[derive(Debug)]
pub struct Template {
    compiled: Option<Compiled>,
}

impl Template {
    /// Parse `source` with default options.
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with(source, &TemplateOptions::default())
    }

    /// Parse `source` with explicit options.
    ///
    /// Errors carry the row and column of the failure, the offending
    /// source line with a caret under the position, and the innermost
    /// block tag left open, if any.
    pub fn parse_with(source: &str, options: &TemplateOptions) -> Result<Self> {
        let compiled = engine::parse(source, options).map_err(|fault| fault.into_error(PARSE))?;
        Ok(Self {
            compiled: Some(compiled),
        })
    }

    /// Render against a context.
    ///
    /// Undefined-value errors list the top-level names the template reads
    /// that the context does not provide.
    pub fn render(&self, context: &RenderContext) -> Result<String> {
        let compiled = self.live()?;
        let engine_context = context.engine()?;
        engine::render_context(compiled, engine_context).map_err(|fault| fault.into_error(RENDER))
    }

    /// Render against raw JSON text, parsed on the engine side.
    pub fn render_json(&self, json: &str) -> Result<String> {
        let compiled = self.live()?;
        engine::render_json(compiled, json).map_err(|fault| fault.into_error(RENDER_JSON))
    }

    /// Convert `data` with default builder options and render against it.
    pub fn render_data<T: ToValue + ?Sized>(&self, data: &T) -> Result<String> {
        self.live()?;
        self.render(&RenderContext::from_data(data)?)
    }

    /// Convert `data` through serde and render against it.
    pub fn render_serialize<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        self.live()?;
        self.render(&RenderContext::from_serialize(data)?)
    }

    /// Release the parsed template. Idempotent.
    pub fn dispose(&mut self) {
        if self.compiled.take().is_some() {
            tracing::trace!("released template");
        }
    }

    /// Check if this template has been disposed
    pub fn is_disposed(&self) -> bool {
        self.compiled.is_none()
    }

    fn live(&self) -> Result<&Compiled> {
        self.compiled.as_ref().ok_or(StencilError::Disposed {
            handle: HandleKind::Template,
        })
    }
}

impl Drop for Template {
    fn drop(&mut self) {
        self.dispose();
    }
}
