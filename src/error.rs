//! Pipeline error types.
//!
//! Every variant fails a single template; the orchestrator logs it and moves on.
//! Image resolution misses are not errors here, see `images::ImageError`.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Template markup or required stylesheet absent or unreadable.
    #[error("missing source `{}`", .0.display())]
    SourceMissing(PathBuf, #[source] io::Error),

    /// Context JSON failed to parse.
    #[error("malformed content in `{}`", .0.display())]
    MalformedContent(PathBuf, #[source] serde_json::Error),

    #[error("render error in `{name}`: {message}")]
    Render { name: String, message: String },

    #[error("style compile error in `{}`: {}", .0.display(), .1)]
    StyleCompile(PathBuf, String),

    #[error("markup error: {0}")]
    Markup(String),

    #[error("failed to write `{}`", .0.display())]
    Write(PathBuf, #[source] io::Error),

    /// A spawned task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for BuildError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
