//! `[build]` section configuration.
//!
//! Directory layout of the template project and the enforced doctype.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in mailkiln.toml - project paths.
///
/// # Example
/// ```toml
/// [build]
/// templates = "templates"  # One subdirectory per email
/// output = "build"         # Artifacts land here
/// common = "common"        # Shared reset stylesheets
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Template source directory.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Shared default stylesheets (`reset-head.scss`, `reset-inline.scss`).
    #[serde(default = "defaults::build::common")]
    #[educe(Default = defaults::build::common())]
    pub common: PathBuf,

    /// Directory holding persisted caches.
    #[serde(default = "defaults::build::cache")]
    #[educe(Default = defaults::build::cache())]
    pub cache: PathBuf,

    /// Doctype prepended to every HTML artifact.
    #[serde(default = "defaults::build::doctype")]
    #[educe(Default = defaults::build::doctype())]
    pub doctype: String,
}
