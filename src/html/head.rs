//! `<head>` assembly: meta tags, the MSO settings block, head-bound CSS and
//! development stylesheet links.

use crate::dom::{Document, Element, NodeId, NodeKind};

/// Body of the Outlook conditional comment.
const MSO_SETTINGS: &str = "[if mso]><xml><o:OfficeDocumentSettings><o:AllowPNG/><o:PixelsPerInch>96</o:PixelsPerInch></o:OfficeDocumentSettings></xml><![endif]";

const DEV_BEGIN: &str = " BEGIN DEVELOPMENT STYLESHEET INJECTS ";
const DEV_END: &str = " END DEVELOPMENT STYLESHEET INJECTS ";

/// Find `<head>`, creating it at the start of `<html>` (or the document).
pub fn ensure_head(doc: &mut Document) -> NodeId {
    if let Some(head) = doc.find_first("head") {
        return head;
    }
    let parent = doc.find_first("html").unwrap_or(Document::ROOT);
    doc.insert_child(parent, 0, NodeKind::Element(Element::new("head")))
}

/// Prepend charset, viewport and compatibility tags that are not already present,
/// and the MSO settings block.
pub fn inject_meta_tags(doc: &mut Document) {
    let head = ensure_head(doc);
    let metas: Vec<&Element> = doc
        .children(head)
        .iter()
        .filter_map(|&id| doc.element(id))
        .filter(|e| e.name == "meta")
        .collect();

    let http_equiv = |name: &str| {
        metas.iter().any(|m| {
            m.attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case(name))
        })
    };
    let has_charset = http_equiv("Content-Type") || metas.iter().any(|m| m.has_attr("charset"));
    let has_viewport = metas
        .iter()
        .any(|m| m.attr("name").is_some_and(|v| v.eq_ignore_ascii_case("viewport")));
    let has_compat = http_equiv("X-UA-Compatible");
    let has_mso = doc.children(head).iter().any(|&id| {
        matches!(&doc.node(id).kind, NodeKind::Comment(body) if body.contains("o:OfficeDocumentSettings"))
    });

    let mut inserts = Vec::new();
    if !has_charset {
        inserts.push(NodeKind::Element(Element::with_attrs(
            "meta",
            &[("http-equiv", "Content-Type"), ("content", "text/html; charset=utf-8")],
        )));
    }
    if !has_viewport {
        inserts.push(NodeKind::Element(Element::with_attrs(
            "meta",
            &[("name", "viewport"), ("content", "width=device-width, initial-scale=1.0")],
        )));
    }
    if !has_compat {
        inserts.push(NodeKind::Element(Element::with_attrs(
            "meta",
            &[("http-equiv", "X-UA-Compatible"), ("content", "IE=edge")],
        )));
    }
    if !has_mso {
        inserts.push(NodeKind::Comment(MSO_SETTINGS.to_owned()));
    }

    for (index, kind) in inserts.into_iter().enumerate() {
        doc.insert_child(head, index, kind);
    }
}

/// Append head-bound CSS to the first `<style>` in head, creating one if needed.
pub fn inject_head_css(doc: &mut Document, css: &str) {
    if css.is_empty() {
        return;
    }
    let head = ensure_head(doc);
    let style = doc
        .children(head)
        .iter()
        .copied()
        .find(|&id| doc.element(id).is_some_and(|e| e.name == "style"));
    let style = match style {
        Some(id) => id,
        None => doc.append_child(
            head,
            NodeKind::Element(Element::with_attrs("style", &[("type", "text/css")])),
        ),
    };
    doc.append_text(style, css);
}

/// Append development `<link>` tags between marker comments.
pub fn inject_dev_links(doc: &mut Document, hrefs: &[String]) {
    let head = ensure_head(doc);
    doc.append_text(head, "\n");
    doc.append_child(head, NodeKind::Comment(DEV_BEGIN.to_owned()));
    for href in hrefs {
        doc.append_text(head, "\n");
        doc.append_child(
            head,
            NodeKind::Element(Element::with_attrs(
                "link",
                &[("rel", "stylesheet"), ("type", "text/css"), ("href", href)],
            )),
        );
    }
    doc.append_text(head, "\n");
    doc.append_child(head, NodeKind::Comment(DEV_END.to_owned()));
    doc.append_text(head, "\n");
}
