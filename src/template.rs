//! Template directories and their discovery.
//!
//! If the templates root itself holds an `html.<ext>` source it is the only
//! template; otherwise each visible subdirectory is one template.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Context file names, in lookup order.
pub const CONTEXT_FILES: &[&str] = &["content.json", "context.json"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Final path component; names the output directory and artifacts.
    pub name: String,
    pub dir: PathBuf,
}

/// Which markup source of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Html,
    Text,
}

impl SourceKind {
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Text => "text",
        }
    }
}

impl Template {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, dir }
    }

    /// First existing `<kind>.<ext>` source.
    pub fn source(&self, kind: SourceKind, extensions: &[String]) -> Option<PathBuf> {
        extensions
            .iter()
            .map(|ext| self.dir.join(format!("{}.{ext}", kind.stem())))
            .find(|path| path.is_file())
    }

    /// Path the source is expected at when none exists.
    pub fn expected_source(&self, kind: SourceKind, extensions: &[String]) -> PathBuf {
        let ext = extensions.first().map(String::as_str).unwrap_or("tpl");
        self.dir.join(format!("{}.{ext}", kind.stem()))
    }

    pub fn context_file(&self) -> Option<PathBuf> {
        CONTEXT_FILES
            .iter()
            .map(|name| self.dir.join(name))
            .find(|path| path.is_file())
    }

    /// Output-relative path of an artifact, e.g. `welcome/welcome.dev.html`.
    pub fn artifact_path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(&self.name).join(format!("{}.{suffix}", self.name))
    }
}

/// Discover templates under `root`, sorted by name.
pub fn discover_templates(root: &Path, extensions: &[String]) -> Result<Vec<Template>> {
    let single = Template::new(root);
    if single.source(SourceKind::Html, extensions).is_some() {
        return Ok(vec![single]);
    }

    let entries = fs::read_dir(root)
        .with_context(|| format!("failed to read templates directory `{}`", root.display()))?;

    let mut templates: Vec<Template> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| Template::new(entry.path()))
        .collect();

    templates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["tpl".into(), "njk".into()]
    }

    #[test]
    fn test_discover_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["welcome", "alert", ".hidden"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("README.md"), "x").unwrap();

        let templates = discover_templates(dir.path(), &exts()).unwrap();
        let names: Vec<_> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alert", "welcome"]);
    }

    #[test]
    fn test_discover_root_is_template() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("html.njk"), "<p></p>").unwrap();
        fs::create_dir(dir.path().join("images")).unwrap();

        let templates = discover_templates(dir.path(), &exts()).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].dir, dir.path());
    }

    #[test]
    fn test_source_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("html.njk"), "b").unwrap();
        fs::write(dir.path().join("html.tpl"), "a").unwrap();

        let template = Template::new(dir.path());
        assert_eq!(
            template.source(SourceKind::Html, &exts()),
            Some(dir.path().join("html.tpl"))
        );
        assert_eq!(template.source(SourceKind::Text, &exts()), None);
        assert_eq!(
            template.expected_source(SourceKind::Text, &exts()),
            dir.path().join("text.tpl")
        );
    }

    #[test]
    fn test_context_file_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let template = Template::new(dir.path());
        assert_eq!(template.context_file(), None);

        fs::write(dir.path().join("context.json"), "{}").unwrap();
        assert_eq!(template.context_file(), Some(dir.path().join("context.json")));

        fs::write(dir.path().join("content.json"), "{}").unwrap();
        assert_eq!(template.context_file(), Some(dir.path().join("content.json")));
    }

    #[test]
    fn test_artifact_path() {
        let template = Template::new("/tmp/templates/welcome");
        assert_eq!(template.name, "welcome");
        assert_eq!(
            template.artifact_path("dev.html"),
            PathBuf::from("welcome/welcome.dev.html")
        );
    }
}
