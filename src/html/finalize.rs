//! Final passes over the production and development markup.

use crate::dom::{Document, NodeKind};
use regex::Regex;
use std::sync::LazyLock;

static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*<!doctype[^>]*>\s*").unwrap());

/// Escaped forms of `{`, `}` and `%` that must become template delimiters again.
///
/// A literal `%` only pairs with an entity-encoded brace; `%7B%` is the start
/// of percent-encoded text, not a tag.
static ESCAPED_DELIMITERS: LazyLock<[(Regex, &'static str); 4]> = LazyLock::new(|| {
    const OPEN_ENTITY: &str = r"(?:&#123;|&#x7B;|&lbrace;|&lcub;)";
    const CLOSE_ENTITY: &str = r"(?:&#125;|&#x7D;|&rbrace;|&rcub;)";
    const PERCENT: &str = r"(?:%25|&#37;|&#x25;|&percnt;)";
    let open = format!("(?:%7B|{OPEN_ENTITY})");
    let close = format!("(?:%7D|{CLOSE_ENTITY})");
    [
        (Regex::new(&format!("(?i){open}{open}")).unwrap(), "{{"),
        (Regex::new(&format!("(?i){close}{close}")).unwrap(), "}}"),
        (Regex::new(&format!("(?i){open}{PERCENT}|{OPEN_ENTITY}%")).unwrap(), "{%"),
        (Regex::new(&format!("(?i){PERCENT}{close}|%{CLOSE_ENTITY}")).unwrap(), "%}"),
    ]
});

/// Whether a comment body is a conditional comment (`[if ...]` or `<![endif]`).
fn is_conditional(body: &str) -> bool {
    let body = body.trim_start();
    body.starts_with("[if") || body.starts_with("<![endif]")
}

/// Remove every comment that is not a conditional comment.
pub fn strip_comments(doc: &mut Document) {
    let comments: Vec<_> = doc
        .descendants(Document::ROOT)
        .into_iter()
        .filter(|&id| matches!(&doc.node(id).kind, NodeKind::Comment(body) if !is_conditional(body)))
        .collect();
    for id in comments {
        doc.detach(id);
    }
}

/// Minify markup and embedded CSS, keeping comments and brace template syntax.
pub fn minify(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = true;
    cfg.minify_css = true;
    cfg.minify_js = false;
    cfg.remove_bangs = false;
    cfg.remove_processing_instructions = true;
    cfg.preserve_brace_template_syntax = true;
    String::from_utf8_lossy(&minify_html::minify(html.as_bytes(), &cfg)).into_owned()
}

/// Turn entity- or percent-escaped `{{ }}` / `{% %}` back into raw delimiters.
pub fn patch_delimiters(html: &str) -> String {
    ESCAPED_DELIMITERS
        .iter()
        .fold(html.to_owned(), |html, (pattern, raw)| {
            pattern.replace_all(&html, *raw).into_owned()
        })
}

/// Replace any leading doctype with `doctype` on its own line.
pub fn apply_doctype(html: &str, doctype: &str) -> String {
    let body = DOCTYPE.replace(html, "");
    format!("{doctype}\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCTYPE_401: &str = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd">"#;

    #[test]
    fn test_strip_comments_keeps_conditionals() {
        let mut doc = Document::parse(
            "<p><!-- note --></p><!--[if mso]><table><![endif]--><!--[if !mso]><!--><div></div><!--<![endif]-->",
        )
        .unwrap();
        strip_comments(&mut doc);
        assert_eq!(
            doc.to_html(),
            "<p></p><!--[if mso]><table><![endif]--><!--[if !mso]><!--><div></div><!--<![endif]-->"
        );
    }

    #[test]
    fn test_patch_delimiters() {
        assert_eq!(
            patch_delimiters(r#"<a href="%7B%7Burl%7D%7D">&#123;&#123; name &#125;&#125;</a>"#),
            r#"<a href="{{url}}">{{ name }}</a>"#
        );
        assert_eq!(patch_delimiters("%7B%25 if x %25%7D"), "{% if x %}");
        assert_eq!(patch_delimiters("&lbrace;&#X7B;a&rcub;&rbrace;"), "{{a}}");
        assert_eq!(patch_delimiters("100% {plain}"), "100% {plain}");
        assert_eq!(patch_delimiters("&#123;% if x %&#125;"), "{% if x %}");
    }

    #[test]
    fn test_patch_delimiters_keeps_percent_encoded_urls() {
        let html = r#"<a href="https://x.test/?d=%7B%22a%22%3A1%7D&amp;p=50%%7D">x</a>"#;
        assert_eq!(patch_delimiters(html), html);
    }

    #[test]
    fn test_apply_doctype_replaces_existing() {
        let html = apply_doctype("<!doctype html>\n<html></html>", DOCTYPE_401);
        assert_eq!(html, format!("{DOCTYPE_401}\n<html></html>"));
        assert_eq!(html.matches("DOCTYPE").count(), 1);

        let html = apply_doctype("<html></html>", "<!doctype html>");
        assert_eq!(html, "<!doctype html>\n<html></html>");
    }

    #[test]
    fn test_minify_keeps_conditional_comments_and_braces() {
        let html = "<html>\n  <head>\n    <style>p { color : red ; }</style>\n  </head>\n  <body>\n    <!--[if mso]><b>x</b><![endif]-->\n    <p>{{ name }}</p>\n  </body>\n</html>";
        let minified = minify(html);
        assert!(minified.len() < html.len());
        assert!(minified.contains("<!--[if mso]>"));
        assert!(minified.contains("{{ name }}"));
        assert!(minified.contains("</p>"));
    }
}
