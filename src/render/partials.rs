//! Partial ("component") registry.
//!
//! Partials are found recursively under each search root and keyed by their
//! path relative to that root, without extension: `buttons/primary`.

use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs, path::PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct Partials {
    entries: BTreeMap<String, String>,
}

impl Partials {
    /// Register every partial under `roots`. Missing roots are skipped;
    /// on a name clash the earlier root wins.
    pub fn load(roots: &[PathBuf], extensions: &[String]) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for root in roots.iter().filter(|root| root.is_dir()) {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.with_context(|| format!("failed to walk `{}`", root.display()))?;
                let path = entry.path();
                let accepted = path.extension().is_some_and(|ext| {
                    let ext = ext.to_string_lossy();
                    ext == "html" || extensions.iter().any(|e| *e == ext)
                });
                if !entry.file_type().is_file() || !accepted {
                    continue;
                }
                let Ok(rel) = path.with_extension("").strip_prefix(root).map(PathBuf::from) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if entries.contains_key(&key) {
                    continue;
                }
                let source = fs::read_to_string(path)
                    .with_context(|| format!("failed to read partial `{}`", path.display()))?;
                entries.insert(key, source);
            }
        }
        Ok(Self { entries })
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_recursive_keys() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("components");
        fs::create_dir_all(root.join("buttons/round")).unwrap();
        fs::write(root.join("header.tpl"), "<h1>{{ title }}</h1>").unwrap();
        fs::write(root.join("buttons/primary.njk"), "<a>go</a>").unwrap();
        fs::write(root.join("buttons/round/small.html"), "<a>o</a>").unwrap();
        fs::write(root.join("notes.md"), "ignored").unwrap();

        let partials = Partials::load(&[root], &["tpl".into(), "njk".into()]).unwrap();
        let keys: Vec<_> = partials.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["buttons/primary", "buttons/round/small", "header"]);
        assert_eq!(partials.get("header"), Some("<h1>{{ title }}</h1>"));
    }

    #[test]
    fn test_first_root_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("footer.tpl"), "A").unwrap();
        fs::write(b.join("footer.tpl"), "B").unwrap();

        let partials = Partials::load(&[a, b, dir.path().join("missing")], &["tpl".into()]).unwrap();
        assert_eq!(partials.len(), 1);
        assert_eq!(partials.get("footer"), Some("A"));
    }
}
