//! Character-level cleanup of final artifacts.
//!
//! The text variant is folded to plain ASCII; HTML variants keep every
//! character but encode non-ASCII ones as numeric references.

use crate::{
    dom::{Document, NodeId, NodeKind, decode_entities},
    error::BuildError,
};

/// Elements whose content never reaches the text variant.
const HIDDEN_ELEMENTS: &[&str] = &["head", "style", "script", "title"];

/// Elements rendered on lines of their own.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "table", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li",
    "blockquote", "center", "section", "header", "footer", "hr",
];

/// Fold typographic punctuation to ASCII and drop whatever else is non-ASCII.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201c}' | '\u{201d}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            c if c.is_ascii() => out.push(c),
            _ => {}
        }
    }
    out
}

/// Encode every non-ASCII character as a decimal character reference.
pub fn encode_non_ascii(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    for ch in html.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            out.push_str(&format!("&#{};", ch as u32));
        }
    }
    out
}

/// Extract readable text from rendered HTML, typography-normalized.
pub fn html_to_text(html: &str) -> Result<String, BuildError> {
    let doc = Document::parse(html)?;
    let mut raw = String::new();
    write_text(&doc, Document::ROOT, &mut raw);

    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines().map(str::trim) {
        // at most one blank line in a row
        if line.is_empty() && lines.last().is_none_or(|last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut text = normalize_text(&lines.join("\n"));
    text.push('\n');
    Ok(text)
}

fn write_text(doc: &Document, id: NodeId, out: &mut String) {
    for &child in doc.children(id) {
        match &doc.node(child).kind {
            NodeKind::Text(raw) => push_collapsed(out, &decode_entities(raw)),
            NodeKind::Element(elem) if HIDDEN_ELEMENTS.contains(&elem.name.as_str()) => {}
            NodeKind::Element(elem) if elem.name == "br" => out.push('\n'),
            NodeKind::Element(elem) if elem.name == "img" => {
                if let Some(alt) = elem.attr_decoded("alt").filter(|a| !a.trim().is_empty()) {
                    push_collapsed(out, &alt);
                }
            }
            NodeKind::Element(elem) if elem.name == "a" => {
                let mut label = String::new();
                write_text(doc, child, &mut label);
                let label = label.trim();
                out.push_str(label);
                if let Some(href) = elem.attr_decoded("href")
                    && !href.starts_with('#')
                    && !href.is_empty()
                    && href.trim_start_matches("mailto:") != label
                {
                    out.push_str(&format!(" ({href})"));
                }
            }
            NodeKind::Element(elem) if BLOCK_ELEMENTS.contains(&elem.name.as_str()) => {
                out.push_str("\n\n");
                write_text(doc, child, out);
                out.push_str("\n\n");
            }
            NodeKind::Element(_) | NodeKind::Root => write_text(doc, child, out),
            NodeKind::Comment(_) | NodeKind::Raw(_) => {}
        }
    }
}

/// Append text with whitespace runs collapsed to one space.
fn push_collapsed(out: &mut String, text: &str) {
    for (i, word) in text.split(|c: char| c.is_whitespace() && c != '\u{a0}').enumerate() {
        if i > 0 && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
        out.push_str(&word.replace('\u{a0}', " "));
    }
}
