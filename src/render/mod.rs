//! Template rendering.
//!
//! A [`Renderer`] turns one markup source plus a JSON context into a string.
//! [`Renderer::render`] drives both variants of a template: the HTML source
//! sees markdown-formatted content (when enabled), the text source always
//! sees the raw strings.

mod jinja;
pub mod markdown;
mod partials;
mod substitution;

pub use jinja::JinjaRenderer;
pub use partials::Partials;
pub use substitution::SubstitutionRenderer;

use crate::{
    config::{EngineKind, KilnConfig},
    error::BuildError,
    template::{SourceKind, Template},
    typography,
};
use serde_json::{Map, Value};
use std::{fs, io, path::Path, sync::Arc};

/// Raw output of both markup variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub extensions: Vec<String>,
    pub markdown: bool,
    pub text_from_html: bool,
}

impl RenderOptions {
    pub fn from_config(config: &KilnConfig) -> Self {
        Self {
            extensions: config.render.extensions.clone(),
            markdown: config.render.markdown,
            text_from_html: config.render.text_from_html,
        }
    }
}

pub trait Renderer: Send + Sync {
    /// Render a single source. `name` identifies it in error messages.
    fn render_source(&self, name: &str, source: &str, context: &Value)
    -> Result<String, BuildError>;

    /// Render the HTML and text sources of a template.
    fn render(
        &self,
        template: &Template,
        context: &Value,
        options: &RenderOptions,
    ) -> Result<Rendered, BuildError> {
        let html_path = template
            .source(SourceKind::Html, &options.extensions)
            .ok_or_else(|| missing(template, SourceKind::Html, options))?;
        let html_context = if options.markdown {
            markdown::format_value(context)
        } else {
            context.clone()
        };
        let html = self.render_source(
            &source_name(template, &html_path),
            &read_source(&html_path)?,
            &html_context,
        )?;

        let text = match template.source(SourceKind::Text, &options.extensions) {
            Some(text_path) => self.render_source(
                &source_name(template, &text_path),
                &read_source(&text_path)?,
                context,
            )?,
            None if options.text_from_html => typography::html_to_text(&html)?,
            None => return Err(missing(template, SourceKind::Text, options)),
        };

        Ok(Rendered { html, text })
    }
}

/// Pick the engine named in the configuration.
pub fn create_renderer(
    engine: EngineKind,
    partials: &Partials,
) -> Result<Arc<dyn Renderer>, BuildError> {
    Ok(match engine {
        EngineKind::Jinja => Arc::new(JinjaRenderer::new(partials)?),
        EngineKind::Substitution => Arc::new(SubstitutionRenderer::new(partials)),
    })
}

/// Load a template's context. No file, or an empty one, yields `{}`.
pub fn load_context(template: &Template) -> Result<Value, BuildError> {
    let Some(path) = template.context_file() else {
        return Ok(Value::Object(Map::new()));
    };
    let content =
        fs::read_to_string(&path).map_err(|err| BuildError::SourceMissing(path.clone(), err))?;
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(&content).map_err(|err| BuildError::MalformedContent(path, err))
}

/// Load the context and render both variants.
pub fn render_template(
    renderer: &dyn Renderer,
    template: &Template,
    options: &RenderOptions,
) -> Result<Rendered, BuildError> {
    let context = load_context(template)?;
    renderer.render(template, &context, options)
}

fn read_source(path: &Path) -> Result<String, BuildError> {
    fs::read_to_string(path).map_err(|err| BuildError::SourceMissing(path.to_path_buf(), err))
}

fn source_name(template: &Template, path: &Path) -> String {
    let file = path.file_name().unwrap_or_default().to_string_lossy();
    format!("{}/{file}", template.name)
}

fn missing(template: &Template, kind: SourceKind, options: &RenderOptions) -> BuildError {
    BuildError::SourceMissing(
        template.expected_source(kind, &options.extensions),
        io::Error::new(io::ErrorKind::NotFound, "template source not found"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RenderOptions {
        RenderOptions {
            extensions: vec!["tpl".into()],
            markdown: true,
            text_from_html: false,
        }
    }

    fn template(files: &[(&str, &str)]) -> (tempfile::TempDir, Template) {
        let dir = tempfile::tempdir().unwrap();
        let tpl_dir = dir.path().join("welcome");
        fs::create_dir_all(&tpl_dir).unwrap();
        for (name, content) in files {
            fs::write(tpl_dir.join(name), content).unwrap();
        }
        (dir, Template::new(tpl_dir))
    }

    #[test]
    fn test_minimal_template_both_engines() {
        let (_dir, tpl) = template(&[
            ("html.tpl", "<h1>{{title}}</h1>"),
            ("text.tpl", "{{title}}\n"),
            ("content.json", r#"{"title": "Hello"}"#),
        ]);
        for engine in [EngineKind::Jinja, EngineKind::Substitution] {
            let renderer = create_renderer(engine, &Partials::default()).unwrap();
            let rendered = render_template(renderer.as_ref(), &tpl, &options()).unwrap();
            assert_eq!(rendered.html, "<h1>Hello</h1>");
            assert_eq!(rendered.text, "Hello\n");
        }
    }

    #[test]
    fn test_markdown_only_reaches_html() {
        let (_dir, tpl) = template(&[
            ("html.tpl", "<p>{{ body }}</p>"),
            ("text.tpl", "{{ body }}"),
            ("content.json", r#"{"body": "Hi **there**"}"#),
        ]);
        let renderer = create_renderer(EngineKind::Jinja, &Partials::default()).unwrap();

        let rendered = render_template(renderer.as_ref(), &tpl, &options()).unwrap();
        assert_eq!(rendered.html, "<p>Hi <strong>there</strong></p>");
        assert_eq!(rendered.text, "Hi **there**");

        let plain = RenderOptions {
            markdown: false,
            ..options()
        };
        let rendered = render_template(renderer.as_ref(), &tpl, &plain).unwrap();
        assert_eq!(rendered.html, "<p>Hi **there**</p>");
    }

    #[test]
    fn test_missing_context_is_empty_object() {
        let (_dir, tpl) = template(&[("html.tpl", "x"), ("text.tpl", "y")]);
        assert_eq!(load_context(&tpl).unwrap(), Value::Object(Map::new()));

        let (_dir, tpl) = template(&[("context.json", "  \n")]);
        assert_eq!(load_context(&tpl).unwrap(), Value::Object(Map::new()));
    }

    #[test]
    fn test_malformed_context() {
        let (_dir, tpl) = template(&[("content.json", "{\"title\": ")]);
        assert!(matches!(load_context(&tpl), Err(BuildError::MalformedContent(..))));
    }

    #[test]
    fn test_missing_html_source() {
        let (_dir, tpl) = template(&[("text.tpl", "y")]);
        let renderer = create_renderer(EngineKind::Jinja, &Partials::default()).unwrap();
        let err = render_template(renderer.as_ref(), &tpl, &options()).unwrap_err();
        assert!(matches!(err, BuildError::SourceMissing(path, _) if path.ends_with("html.tpl")));
    }

    #[test]
    fn test_text_derived_from_html() {
        let (_dir, tpl) = template(&[("html.tpl", "<p>Hello</p><p><a href=\"https://x.test\">Shop</a></p>")]);
        let renderer = create_renderer(EngineKind::Jinja, &Partials::default()).unwrap();
        let derived = RenderOptions {
            text_from_html: true,
            ..options()
        };
        let rendered = render_template(renderer.as_ref(), &tpl, &derived).unwrap();
        assert_eq!(rendered.text, "Hello\n\nShop (https://x.test)\n");

        let err = render_template(renderer.as_ref(), &tpl, &options()).unwrap_err();
        assert!(matches!(err, BuildError::SourceMissing(..)));
    }
}
