//! `[styles]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[styles]` section in mailkiln.toml - stylesheet file names.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Required per-template stylesheet.
    #[serde(default = "defaults::styles::main")]
    #[educe(Default = defaults::styles::main())]
    pub main: String,

    /// Reset kept in the document head.
    #[serde(default = "defaults::styles::reset_head")]
    #[educe(Default = defaults::styles::reset_head())]
    pub reset_head: String,

    /// Reset inlined onto elements.
    #[serde(default = "defaults::styles::reset_inline")]
    #[educe(Default = defaults::styles::reset_inline())]
    pub reset_inline: String,

    /// Emit compiled CSS files for inspection and the dev variant.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub write_css: bool,
}
