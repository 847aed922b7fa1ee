//! HTML parsing on top of quick-xml.
//!
//! quick-xml is an XML reader, so a few HTML habits are patched around:
//! void elements never get pushed on the open-element stack, unmatched end
//! tags are ignored, `<style>`/`<script>` bodies are read verbatim, and bare
//! `&` and `<` characters are escaped before reading.

use super::{Attribute, Document, Element, NodeId, NodeKind, is_void};
use crate::error::BuildError;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::borrow::Cow;

/// Elements whose content is raw text.
const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script"];

impl Document {
    /// Parse an HTML document or fragment.
    ///
    /// Any doctype is dropped; it is re-applied when the artifact is finalized.
    pub fn parse(html: &str) -> Result<Self, BuildError> {
        let ampersands = escape_bare_ampersands(html);
        let prepared = escape_bare_angles(&ampersands);
        let mut reader = Reader::from_str(&prepared);
        reader.config_mut().trim_text(false);
        reader.config_mut().enable_all_checks(false);
        reader.config_mut().allow_unmatched_ends = true;

        let mut doc = Document::default();
        let mut stack: Vec<NodeId> = vec![Document::ROOT];

        loop {
            let top = stack.last().copied().unwrap_or(Document::ROOT);
            match reader.read_event() {
                Ok(Event::Start(elem)) => {
                    let element = element_from(&elem, false);
                    let name = element.name.clone();
                    let id = doc.append_child(top, NodeKind::Element(element));
                    if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                        let body = reader.read_text(elem.name()).map_err(|e| markup_error(&reader, e))?;
                        if !body.is_empty() {
                            doc.append_text(id, &body);
                        }
                    } else if !is_void(&name) {
                        stack.push(id);
                    }
                }
                Ok(Event::Empty(elem)) => {
                    doc.append_child(top, NodeKind::Element(element_from(&elem, true)));
                }
                Ok(Event::End(elem)) => {
                    let name = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
                    let open = stack.iter().rposition(|&id| {
                        doc.element(id).is_some_and(|e| e.name == name)
                    });
                    if let Some(pos) = open {
                        stack.truncate(pos);
                    }
                }
                Ok(Event::Text(text)) => doc.append_text(top, &String::from_utf8_lossy(&text)),
                Ok(Event::GeneralRef(reference)) => {
                    doc.append_text(top, &format!("&{};", String::from_utf8_lossy(&reference)));
                }
                Ok(Event::Comment(comment)) => {
                    doc.append_child(top, NodeKind::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
                Ok(Event::CData(cdata)) => {
                    let raw = format!("<![CDATA[{}]]>", String::from_utf8_lossy(&cdata));
                    doc.append_child(top, NodeKind::Raw(raw));
                }
                Ok(Event::PI(pi)) => {
                    let raw = format!("<?{}?>", String::from_utf8_lossy(&pi));
                    doc.append_child(top, NodeKind::Raw(raw));
                }
                Ok(Event::DocType(_) | Event::Decl(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => return Err(markup_error(&reader, e)),
            }
        }

        Ok(doc)
    }
}

fn markup_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> BuildError {
    BuildError::Markup(format!(
        "parse error at position {}: {err}",
        reader.error_position()
    ))
}

/// Convert a start tag, lowercasing names and keeping raw attribute values.
fn element_from(elem: &BytesStart<'_>, self_closing: bool) -> Element {
    let name = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
    let attrs = elem
        .html_attributes()
        .with_checks(false)
        .flatten()
        .map(|attr| Attribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase(),
            value: String::from_utf8_lossy(&attr.value).into_owned(),
        })
        .collect();
    Element {
        name,
        attrs,
        self_closing,
    }
}

/// Escape `&` characters that do not start a character reference.
fn escape_bare_ampersands(html: &str) -> Cow<'_, str> {
    if !html.contains('&') {
        return Cow::Borrowed(html);
    }
    let mut out = String::with_capacity(html.len() + 16);
    let mut rest = html;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if starts_with_reference(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = tail;
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Escape `<` characters that cannot open a tag, comment or declaration.
fn escape_bare_angles(html: &str) -> Cow<'_, str> {
    let opens_markup = |c: char| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?');
    let mut bare = html
        .match_indices('<')
        .filter(|(pos, _)| !html[pos + 1..].chars().next().is_some_and(opens_markup))
        .map(|(pos, _)| pos)
        .peekable();
    if bare.peek().is_none() {
        return Cow::Borrowed(html);
    }
    let mut out = String::with_capacity(html.len() + 16);
    let mut last = 0;
    for pos in bare {
        out.push_str(&html[last..pos]);
        out.push_str("&lt;");
        last = pos + 1;
    }
    out.push_str(&html[last..]);
    Cow::Owned(out)
}

fn starts_with_reference(tail: &str) -> bool {
    let Some(end) = tail.find(';') else {
        return false;
    };
    let name = &tail[..end];
    if let Some(num) = name.strip_prefix('#') {
        return match num.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        };
    }
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_preserves_markup() {
        let html = r#"<html><head><title>Hi</title></head><body><p class="x">a &amp; b&nbsp;c</p></body></html>"#;
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn test_parse_drops_doctype() {
        let doc = Document::parse("<!DOCTYPE html>\n<p>x</p>").unwrap();
        assert_eq!(doc.to_html(), "\n<p>x</p>");
    }

    #[test]
    fn test_parse_void_elements_without_slash() {
        let doc = Document::parse(r#"<td><img src="a.png"><br>text</td>"#).unwrap();
        let td = doc.find_first("td").unwrap();
        let img = doc.find_first("img").unwrap();

        assert_eq!(doc.parent(img), Some(td));
        assert!(doc.children(img).is_empty());
        assert_eq!(doc.to_html(), r#"<td><img src="a.png"><br>text</td>"#);
    }

    #[test]
    fn test_parse_lowercases_names() {
        let doc = Document::parse(r#"<TABLE WIDTH="100%"><TD>x</TD></TABLE>"#).unwrap();
        let table = doc.find_first("table").unwrap();
        assert_eq!(doc.element(table).unwrap().attr("width"), Some("100%"));
        assert_eq!(doc.to_html(), r#"<table width="100%"><td>x</td></table>"#);
    }

    #[test]
    fn test_parse_bare_ampersand() {
        let doc = Document::parse(r#"<a href="/x?a=1&b=2">Tom & Jerry</a>"#).unwrap();
        assert_eq!(doc.to_html(), r#"<a href="/x?a=1&amp;b=2">Tom &amp; Jerry</a>"#);
    }

    #[test]
    fn test_parse_bare_less_than() {
        let doc = Document::parse("<p>1 < 2</p><p>x <3 <</p>").unwrap();
        assert_eq!(doc.to_html(), "<p>1 &lt; 2</p><p>x &lt;3 &lt;</p>");
        assert_eq!(doc.find_all("p").len(), 2);
    }

    #[test]
    fn test_parse_unmatched_end_tag_ignored() {
        let doc = Document::parse("<div><span>a</div></span><p>b</p>").unwrap();
        assert_eq!(doc.to_html(), "<div><span>a</span></div><p>b</p>");
    }

    #[test]
    fn test_parse_style_body_verbatim() {
        let doc = Document::parse("<style>td > a:hover { color: red }</style>").unwrap();
        let style = doc.find_first("style").unwrap();
        assert_eq!(doc.raw_text(style), "td > a:hover { color: red }");
    }

    #[test]
    fn test_parse_comments_kept() {
        let html = "<head><!--[if mso]><style>td{}</style><![endif]--></head>";
        let doc = Document::parse(html).unwrap();
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn test_parse_template_delimiters_in_text() {
        let html = r#"<a href="{{ url }}">{% if x %}y{% endif %}</a>"#;
        assert_eq!(Document::parse(html).unwrap().to_html(), html);
    }

    #[test]
    fn test_escape_bare_ampersands() {
        assert_eq!(escape_bare_ampersands("a & b"), "a &amp; b");
        assert_eq!(escape_bare_ampersands("&amp;&#160;&#xA0;"), "&amp;&#160;&#xA0;");
        assert_eq!(escape_bare_ampersands("&x y;"), "&amp;x y;");
        assert_eq!(escape_bare_ampersands("none"), "none");
    }

    #[test]
    fn test_escape_bare_angles() {
        assert_eq!(escape_bare_angles("a < b"), "a &lt; b");
        assert_eq!(escape_bare_angles("<p><!--c--></p><?x?>"), "<p><!--c--></p><?x?>");
        assert_eq!(escape_bare_angles("<<b>"), "&lt;<b>");
        assert!(matches!(escape_bare_angles("<td>"), Cow::Borrowed(_)));
    }
}
