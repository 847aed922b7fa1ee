//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn output() -> PathBuf {
        "build".into()
    }

    pub fn common() -> PathBuf {
        "common".into()
    }

    pub fn cache() -> PathBuf {
        "cache".into()
    }

    pub fn doctype() -> String {
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd">"#
            .into()
    }
}

// ============================================================================
// [render] Section Defaults
// ============================================================================

pub mod render {
    use std::path::PathBuf;

    pub fn extensions() -> Vec<String> {
        ["tpl", "njk", "jinja", "hbs"].map(String::from).to_vec()
    }

    pub fn components() -> Vec<PathBuf> {
        vec!["components".into()]
    }
}

// ============================================================================
// [styles] Section Defaults
// ============================================================================

pub mod styles {
    pub fn main() -> String {
        "style.scss".into()
    }

    pub fn reset_head() -> String {
        "reset-head.scss".into()
    }

    pub fn reset_inline() -> String {
        "reset-inline.scss".into()
    }
}

// ============================================================================
// [html] Section Defaults
// ============================================================================

pub mod html {
    pub fn link_target() -> Option<String> {
        Some("_blank".into())
    }

    pub fn size_attributes() -> Vec<String> {
        ["table", "td", "th", "img"].map(String::from).to_vec()
    }

    /// Selectors email clients inject at render time; never stripped.
    pub fn whitelist() -> Vec<String> {
        [
            ".ExternalClass",
            ".ReadMsgBody",
            ".yshortcuts",
            ".apple-link",
            "#outlook",
            "#MessageViewBody",
            "u + .body",
            "[x-apple-data-detectors]",
            "[data-ogsc]",
        ]
        .map(String::from)
        .to_vec()
    }
}

// ============================================================================
// [images] Section Defaults
// ============================================================================

pub mod images {
    pub fn cache_file() -> String {
        "images.json".into()
    }

    pub fn timeout_secs() -> u64 {
        10
    }

    pub fn max_concurrent() -> usize {
        8
    }
}
