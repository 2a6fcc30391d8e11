//! Boundary to the rendering engine
//!
//! This is the only module that talks to `minijinja` and to the JSON parser
//! used by the raw-JSON render path. Every entry point reports failure as a
//! [`Fault`]: a status from the closed set in [`Status`] plus a diagnostic
//! formatted `ERROR: <phrase>: <engine text>`.

mod diagnostics;

use std::collections::BTreeSet;

use minijinja::Environment;

use crate::error::{Status, StencilError};
use crate::options::TemplateOptions;
use crate::value::Value;

/// Name under which the single template of an environment is registered.
const TEMPLATE_NAME: &str = "template";

/// A failed engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fault {
    pub(crate) status: Status,
    pub(crate) detail: String,
}

impl Fault {
    pub(crate) fn new(status: Status, phrase: &str, text: impl std::fmt::Display) -> Self {
        Self {
            status,
            detail: format!("ERROR: {}: {}", phrase, text),
        }
    }

    /// Turn this fault into the typed error for `operation`.
    pub(crate) fn into_error(self, operation: &'static str) -> StencilError {
        StencilError::from_status(self.status, operation, self.detail)
    }
}

/// A parsed template together with its own environment.
pub(crate) struct Compiled {
    env: Environment<'static>,
    source_len: usize,
}

impl std::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiled")
            .field("source_len", &self.source_len)
            .finish_non_exhaustive()
    }
}

/// Root data converted for the engine, plus its top-level keys.
#[derive(Debug)]
pub(crate) struct EngineContext {
    value: minijinja::Value,
    keys: BTreeSet<String>,
}

/// Parse `source` under `options`.
pub(crate) fn parse(source: &str, options: &TemplateOptions) -> Result<Compiled, Fault> {
    let mut env = Environment::new();
    options.apply(&mut env);

    env.add_template_owned(TEMPLATE_NAME, source.to_owned())
        .map_err(|err| Fault {
            status: Status::TemplateParse,
            detail: diagnostics::parse_failure(source, &err),
        })?;

    tracing::debug!(bytes = source.len(), "parsed template");
    Ok(Compiled {
        env,
        source_len: source.len(),
    })
}

/// Convert a sealed root for rendering.
pub(crate) fn context_make(root: &Value) -> Result<EngineContext, Fault> {
    if root.is_disposed() {
        return Err(Fault::new(
            Status::InvalidArgument,
            "Context creation failed",
            "root value has been released",
        ));
    }

    let keys = root.keys().into_iter().collect::<BTreeSet<_>>();
    tracing::debug!(keys = keys.len(), "created engine context");
    Ok(EngineContext {
        value: minijinja::Value::from_serialize(root),
        keys,
    })
}

/// Render a parsed template against a context.
pub(crate) fn render_context(
    compiled: &Compiled,
    context: &EngineContext,
) -> Result<String, Fault> {
    render(compiled, &context.value, &context.keys)
}

/// Parse `json` and render a parsed template against it.
pub(crate) fn render_json(compiled: &Compiled, json: &str) -> Result<String, Fault> {
    let data: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| Fault::new(Status::JsonParse, "JSON parse error", err))?;

    let keys = match &data {
        serde_json::Value::Object(map) => map.keys().cloned().collect(),
        _ => BTreeSet::new(),
    };
    render(compiled, &minijinja::Value::from_serialize(&data), &keys)
}

fn render(
    compiled: &Compiled,
    ctx: &minijinja::Value,
    keys: &BTreeSet<String>,
) -> Result<String, Fault> {
    let template = compiled
        .env
        .get_template(TEMPLATE_NAME)
        .map_err(|err| Fault::new(Status::Error, "Template lookup failed", err))?;

    match template.render(ctx) {
        Ok(output) => {
            tracing::debug!(bytes = output.len(), "rendered template");
            Ok(output)
        }
        Err(err) => {
            let unresolved = if err.kind() == minijinja::ErrorKind::UndefinedError {
                diagnostics::unresolved_names(template.undeclared_variables(false), keys)
            } else {
                Vec::new()
            };
            Err(Fault {
                status: Status::TemplateRender,
                detail: diagnostics::render_failure(template.source(), &err, &unresolved),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Compiled {
        parse(source, &TemplateOptions::default()).unwrap()
    }

    #[test]
    fn test_fault_detail_format() {
        let fault = Fault::new(Status::JsonParse, "JSON parse error", "eof");
        assert_eq!(fault.detail, "ERROR: JSON parse error: eof");
        let err = fault.into_error("Rendering template");
        assert_eq!(err.status(), Status::JsonParse);
    }

    #[test]
    fn test_render_json() {
        let compiled = compile("Hello, {{ name }}!");
        assert_eq!(
            render_json(&compiled, r#"{"name":"World"}"#).unwrap(),
            "Hello, World!"
        );
    }

    #[test]
    fn test_render_json_rejects_malformed() {
        let compiled = compile("{{ x }}");
        let fault = render_json(&compiled, "{ invalid json }").unwrap_err();
        assert_eq!(fault.status, Status::JsonParse);
        assert!(fault.detail.contains("JSON parse error"));
    }

    #[test]
    fn test_parse_failure_status() {
        let fault = parse("{{ name", &TemplateOptions::default()).unwrap_err();
        assert_eq!(fault.status, Status::TemplateParse);
        assert!(fault.detail.starts_with("ERROR: Template parsing failed"));
    }

    #[test]
    fn test_context_make_rejects_disposed_root() {
        let mut root = Value::object();
        root.dispose();
        let fault = context_make(&root).unwrap_err();
        assert_eq!(fault.status, Status::InvalidArgument);
    }

    #[test]
    fn test_render_context_booleans_are_lowercase() {
        let root = Value::object();
        root.set("flag", &Value::bool(true)).unwrap();
        let context = context_make(&root).unwrap();
        let compiled = compile("{{ flag }}");
        assert_eq!(render_context(&compiled, &context).unwrap(), "true");
    }
}
