//! Errors raised while loading and checking `mailkiln.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config `{}`", .0.display())]
    Read(PathBuf, #[source] std::io::Error),

    #[error("config syntax error: {0}")]
    Syntax(#[from] toml::de::Error),

    /// A key holds a value the build cannot work with.
    #[error("[{key}] {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("[{key}] `{}` is not a directory", .path.display())]
    NotADirectory { key: &'static str, path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let read = ConfigError::Read(
            PathBuf::from("mailkiln.toml"),
            Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(read.to_string(), "cannot read config `mailkiln.toml`");

        let invalid = ConfigError::Invalid {
            key: "images.timeout_secs",
            reason: "must be greater than zero".into(),
        };
        assert_eq!(invalid.to_string(), "[images.timeout_secs] must be greater than zero");

        let missing = ConfigError::NotADirectory {
            key: "build.templates",
            path: PathBuf::from("/srv/mail/templates"),
        };
        assert_eq!(
            missing.to_string(),
            "[build.templates] `/srv/mail/templates` is not a directory"
        );
    }
}
