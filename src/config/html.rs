//! `[html]` section configuration.
//!
//! Post-processing switches for the production variant.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[html]` section in mailkiln.toml.
///
/// # Example
/// ```toml
/// [html]
/// minify = true
/// remove_unused_css = true
/// whitelist = [".ExternalClass", "#outlook"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlConfig {
    /// Minify production HTML.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,

    /// Inject charset, viewport and MSO compatibility tags into `<head>`.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub meta_tags: bool,

    /// `target` added to links that have none. `None` disables.
    #[serde(default = "defaults::html::link_target")]
    #[educe(Default = defaults::html::link_target())]
    pub link_target: Option<String>,

    /// Fill empty table cells with `&nbsp;`.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub empty_cell: bool,

    /// Elements whose inlined `width`/`height` become attributes.
    #[serde(default = "defaults::html::size_attributes")]
    #[educe(Default = defaults::html::size_attributes())]
    pub size_attributes: Vec<String>,

    /// Drop head selectors that match nothing in the final markup.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub remove_unused_css: bool,

    /// Selector fragments that always survive unused CSS removal.
    #[serde(default = "defaults::html::whitelist")]
    #[educe(Default = defaults::html::whitelist())]
    pub whitelist: Vec<String>,
}
