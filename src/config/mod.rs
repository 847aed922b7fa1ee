//! Project configuration management for `mailkiln.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                           |
//! |-------------|---------------------------------------------------|
//! | `[build]`   | Template, output, common and cache paths; doctype |
//! | `[render]`  | Template engine, partial roots, markdown          |
//! | `[styles]`  | Stylesheet file names                             |
//! | `[html]`    | Production post-processing switches               |
//! | `[images]`  | Image dimension resolution                        |
//!
//! # Example
//!
//! ```toml
//! [build]
//! templates = "templates"
//! output = "build"
//!
//! [render]
//! engine = "substitution"
//! markdown = false
//!
//! [html]
//! remove_unused_css = true
//!
//! [images]
//! timeout_secs = 5
//! ```

mod build;
pub mod defaults;
mod error;
mod html;
mod images;
mod render;
mod styles;

pub use error::ConfigError;
pub use render::EngineKind;

use build::BuildConfig;
use html::HtmlConfig;
use images::ImagesConfig;
use render::RenderConfig;
use styles::StylesConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing mailkiln.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub styles: StylesConfig,

    #[serde(default)]
    pub html: HtmlConfig,

    #[serde(default)]
    pub images: ImagesConfig,
}

impl KilnConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Persisted image dimension cache file.
    pub fn image_cache_path(&self) -> PathBuf {
        self.build.cache.join(&self.images.cache_file)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.templates, cli.templates.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());
        self.update_path_with_root(&root, &cli.config);

        match &cli.command {
            Commands::Build { build_args } => {
                Self::update_option(&mut self.html.minify, build_args.minify.as_ref());
                Self::update_option(&mut self.render.markdown, build_args.markdown.as_ref());
            }
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve every directory against `root` and normalize to absolute paths
    pub fn update_path_with_root(&mut self, root: &Path, config_name: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);
        self.config_path = Self::normalize_path(&root.join(config_name));

        self.build.templates = Self::normalize_path(&root.join(&self.build.templates));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.common = Self::normalize_path(&root.join(&self.build.common));
        self.build.cache = Self::normalize_path(&root.join(&self.build.cache));
        self.render.components = self
            .render
            .components
            .iter()
            .map(|dir| Self::normalize_path(&root.join(dir)))
            .collect();
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before a build
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &'static str, reason: &str| ConfigError::Invalid {
            key,
            reason: reason.to_owned(),
        };

        if !self.build.doctype.trim_start().to_ascii_lowercase().starts_with("<!doctype") {
            bail!(invalid("build.doctype", "must be a `<!DOCTYPE ...>` declaration"));
        }

        if self.render.extensions.is_empty() {
            bail!(invalid("render.extensions", "must have at least one element"));
        }

        if self.images.timeout_secs == 0 {
            bail!(invalid("images.timeout_secs", "must be greater than zero"));
        }

        if self.images.max_concurrent == 0 {
            bail!(invalid("images.max_concurrent", "must be greater than zero"));
        }

        if !self.build.templates.is_dir() {
            bail!(ConfigError::NotADirectory {
                key: "build.templates",
                path: self.build.templates.clone(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
