//! `[images]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[images]` section in mailkiln.toml - dimension resolution.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Resolve missing `<img>` dimensions.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Cache file name inside `[build.cache]`.
    #[serde(default = "defaults::images::cache_file")]
    #[educe(Default = defaults::images::cache_file())]
    pub cache_file: String,

    /// Remote fetch timeout.
    #[serde(default = "defaults::images::timeout_secs")]
    #[educe(Default = defaults::images::timeout_secs())]
    pub timeout_secs: u64,

    /// Upper bound on concurrent resolutions per document.
    #[serde(default = "defaults::images::max_concurrent")]
    #[educe(Default = defaults::images::max_concurrent())]
    pub max_concurrent: usize,

    /// Copy local images next to the built template.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub copy_local: bool,
}
