//! Template compilation options

use serde::{Deserialize, Serialize};

/// How the engine treats references to missing variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedPolicy {
    /// Missing values print as empty and are falsy; looking up an
    /// attribute on one is a render error
    #[default]
    Lenient,
    /// Attribute lookups on missing values yield missing values too
    Chainable,
    /// Any use of a missing value other than a definedness test fails
    Strict,
}

impl From<UndefinedPolicy> for minijinja::UndefinedBehavior {
    fn from(policy: UndefinedPolicy) -> Self {
        match policy {
            UndefinedPolicy::Lenient => minijinja::UndefinedBehavior::Lenient,
            UndefinedPolicy::Chainable => minijinja::UndefinedBehavior::Chainable,
            UndefinedPolicy::Strict => minijinja::UndefinedBehavior::Strict,
        }
    }
}

/// Options applied when a template is parsed.
///
/// ```
/// use stencil::{Template, TemplateOptions};
///
/// let options = TemplateOptions::new().trim_blocks(true);
/// let template = Template::parse_with("{% if true %}\nyes{% endif %}", &options).unwrap();
/// assert_eq!(template.render_json("{}").unwrap(), "yes");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    /// Remove the first newline after a block tag
    pub trim_blocks: bool,

    /// Strip whitespace before a block tag at the start of a line
    pub lstrip_blocks: bool,

    /// Keep the final newline of the template source
    pub keep_trailing_newline: bool,

    /// Treatment of missing variables
    pub undefined: UndefinedPolicy,
}

impl TemplateOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `trim_blocks` (builder pattern)
    pub fn trim_blocks(mut self, enabled: bool) -> Self {
        self.trim_blocks = enabled;
        self
    }

    /// Set `lstrip_blocks` (builder pattern)
    pub fn lstrip_blocks(mut self, enabled: bool) -> Self {
        self.lstrip_blocks = enabled;
        self
    }

    /// Set `keep_trailing_newline` (builder pattern)
    pub fn keep_trailing_newline(mut self, enabled: bool) -> Self {
        self.keep_trailing_newline = enabled;
        self
    }

    /// Set the undefined policy (builder pattern)
    pub fn undefined(mut self, policy: UndefinedPolicy) -> Self {
        self.undefined = policy;
        self
    }

    /// Configure `env`. Python string and dict methods such as
    /// `startswith`, `split` or `items` are always available.
    pub(crate) fn apply(&self, env: &mut minijinja::Environment<'_>) {
        env.set_trim_blocks(self.trim_blocks);
        env.set_lstrip_blocks(self.lstrip_blocks);
        env.set_keep_trailing_newline(self.keep_trailing_newline);
        env.set_undefined_behavior(self.undefined.into());
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
    }
}
