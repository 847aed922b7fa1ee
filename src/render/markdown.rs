//! Markdown formatting of content strings.
//!
//! Output is meant to be dropped into existing markup, so paragraphs are not
//! wrapped in `<p>` (consecutive paragraphs are joined by a newline) and
//! autolinks stay plain text.

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, html};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?:)?//\S+$").unwrap());

/// Format every string leaf of a context value.
pub fn format_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(format_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(format_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), format_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Format one string. `mailto:` values and lone URLs pass through unchanged.
pub fn format_str(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("mailto:") || BARE_URL.is_match(trimmed) {
        return text.to_owned();
    }

    let mut paragraphs = 0;
    let mut in_autolink = false;
    let events = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH).filter_map(|event| {
        match event {
            Event::Start(Tag::Paragraph) => {
                paragraphs += 1;
                (paragraphs > 1).then(|| Event::Html(CowStr::Borrowed("\n")))
            }
            Event::End(TagEnd::Paragraph) => None,
            Event::Start(Tag::Link {
                link_type: LinkType::Autolink | LinkType::Email,
                ..
            }) => {
                in_autolink = true;
                None
            }
            Event::End(TagEnd::Link) if in_autolink => {
                in_autolink = false;
                None
            }
            other => Some(other),
        }
    });

    let mut out = String::with_capacity(text.len() + 16);
    html::push_html(&mut out, events);
    out
}
