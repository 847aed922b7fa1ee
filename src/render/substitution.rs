//! Direct-substitution engine.
//!
//! `{{ a.b.0 }}` looks a value up by dotted path; `{{> name }}` expands a
//! partial. No control flow and no escaping.

use super::{Partials, Renderer};
use crate::error::BuildError;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

/// Nested partial expansion limit.
const MAX_PARTIAL_DEPTH: usize = 16;

static PARTIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{>\s*([\w./-]+)\s*\}\}").unwrap());

static VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\{?\s*([\w.-]+)\s*\}?\}\}").unwrap());

pub struct SubstitutionRenderer {
    partials: Partials,
}

impl SubstitutionRenderer {
    pub fn new(partials: &Partials) -> Self {
        Self {
            partials: partials.clone(),
        }
    }

    fn expand_partials(&self, name: &str, source: &str) -> Result<String, BuildError> {
        let mut current = source.to_owned();
        for _ in 0..MAX_PARTIAL_DEPTH {
            if !PARTIAL.is_match(&current) {
                return Ok(current);
            }
            current = PARTIAL
                .replace_all(&current, |caps: &Captures<'_>| {
                    self.partials.get(&caps[1]).unwrap_or_default().to_owned()
                })
                .into_owned();
        }
        Err(BuildError::Render {
            name: name.to_owned(),
            message: format!("partials nested deeper than {MAX_PARTIAL_DEPTH} levels"),
        })
    }
}

impl Renderer for SubstitutionRenderer {
    fn render_source(&self, name: &str, source: &str, context: &Value) -> Result<String, BuildError> {
        let expanded = self.expand_partials(name, source)?;
        let rendered = VALUE.replace_all(&expanded, |caps: &Captures<'_>| {
            lookup(context, &caps[1]).map(value_to_string).unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |value, key| match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_paths() {
        let renderer = SubstitutionRenderer::new(&Partials::default());
        let ctx = json!({"title": "Hello", "user": {"name": "Ada"}, "items": ["x", "y"], "n": 3});
        let out = renderer
            .render_source("t", "<h1>{{title}}</h1>{{ user.name }}-{{items.1}}-{{ n }}-{{missing}}", &ctx)
            .unwrap();
        assert_eq!(out, "<h1>Hello</h1>Ada-y-3-");
    }

    #[test]
    fn test_triple_stash_is_raw() {
        let renderer = SubstitutionRenderer::new(&Partials::default());
        let out = renderer
            .render_source("t", "{{{ body }}}", &json!({"body": "<b>x</b>"}))
            .unwrap();
        assert_eq!(out, "<b>x</b>");
    }

    #[test]
    fn test_nested_partials() {
        let partials = Partials::from_pairs(&[
            ("layout/footer", "<footer>{{> legal }}</footer>"),
            ("legal", "(c) {{ year }}"),
        ]);
        let renderer = SubstitutionRenderer::new(&partials);
        let out = renderer
            .render_source("t", "{{> layout/footer }}", &json!({"year": 2024}))
            .unwrap();
        assert_eq!(out, "<footer>(c) 2024</footer>");
    }

    #[test]
    fn test_recursive_partial_fails() {
        let partials = Partials::from_pairs(&[("loop", "a{{> loop }}")]);
        let renderer = SubstitutionRenderer::new(&partials);
        let err = renderer.render_source("t", "{{> loop }}", &json!({})).unwrap_err();
        assert!(matches!(err, BuildError::Render { .. }));
    }
}
