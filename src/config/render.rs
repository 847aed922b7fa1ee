//! `[render]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Template engine used for `html.<ext>` and `text.<ext>` sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Jinja-compatible engine with control flow and `{% include %}`.
    #[default]
    Jinja,
    /// Plain `{{ path }}` lookups and `{{> partial }}` expansion.
    Substitution,
}

/// `[render]` section in mailkiln.toml.
///
/// # Example
/// ```toml
/// [render]
/// engine = "jinja"
/// extensions = ["tpl", "njk"]
/// components = ["components"]
/// markdown = true
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(default)]
    pub engine: EngineKind,

    /// Accepted template source extensions, in lookup order.
    #[serde(default = "defaults::render::extensions")]
    #[educe(Default = defaults::render::extensions())]
    pub extensions: Vec<String>,

    /// Partial search roots, relative to the project root.
    #[serde(default = "defaults::render::components")]
    #[educe(Default = defaults::render::components())]
    pub components: Vec<PathBuf>,

    /// Format string content as markdown before HTML rendering.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub markdown: bool,

    /// Derive the text variant from rendered HTML when no text source exists.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub text_from_html: bool,
}
