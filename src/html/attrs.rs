//! Email-client defaults for tables, images and links.

use crate::dom::{Document, NodeKind, escape_attr};

/// Attributes added when missing, per element.
const DEFAULT_ATTRIBUTES: &[(&str, &[(&str, &str)])] = &[
    ("table", &[("cellpadding", "0"), ("cellspacing", "0"), ("border", "0")]),
    ("img", &[("border", "0")]),
];

/// Add default attributes. Existing attributes are never overwritten.
pub fn apply_default_attributes(doc: &mut Document, link_target: Option<&str>) {
    let target = link_target.map(escape_attr);
    for id in doc.elements() {
        let Some(elem) = doc.element_mut(id) else {
            continue;
        };
        if let Some((_, defaults)) = DEFAULT_ATTRIBUTES.iter().find(|(name, _)| *name == elem.name) {
            for (name, value) in defaults.iter() {
                elem.set_attr_if_missing(name, value);
            }
        }
        if elem.name == "a"
            && elem.has_attr("href")
            && let Some(target) = &target
        {
            elem.set_attr_if_missing("target", target);
        }
    }
}

/// Give `td`/`th` cells holding only whitespace a `&nbsp;`.
pub fn fill_empty_cells(doc: &mut Document) {
    let cells: Vec<_> = doc
        .elements()
        .into_iter()
        .filter(|&id| doc.element(id).is_some_and(|e| e.name == "td" || e.name == "th"))
        .filter(|&id| {
            doc.children(id).iter().all(|&child| match &doc.node(child).kind {
                NodeKind::Text(text) => text.trim().is_empty(),
                NodeKind::Comment(_) => true,
                _ => false,
            })
        })
        .collect();

    for id in cells {
        doc.append_text(id, "&nbsp;");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(html: &str, target: Option<&str>) -> String {
        let mut doc = Document::parse(html).unwrap();
        apply_default_attributes(&mut doc, target);
        doc.to_html()
    }

    #[test]
    fn test_table_and_image_defaults() {
        assert_eq!(
            apply(r#"<table><tr><td><img src="a.png"></td></tr></table>"#, None),
            r#"<table cellpadding="0" cellspacing="0" border="0"><tr><td><img src="a.png" border="0"></td></tr></table>"#
        );
    }

    #[test]
    fn test_existing_attributes_kept() {
        assert_eq!(
            apply(r#"<table border="1"><tr><td></td></tr></table>"#, None),
            r#"<table border="1" cellpadding="0" cellspacing="0"><tr><td></td></tr></table>"#
        );
        assert_eq!(
            apply(r#"<a href="https://x.test" target="_self">x</a>"#, Some("_blank")),
            r#"<a href="https://x.test" target="_self">x</a>"#
        );
    }

    #[test]
    fn test_link_target() {
        assert_eq!(
            apply(r##"<a href="#top">x</a><a name="top">y</a>"##, Some("_blank")),
            r##"<a href="#top" target="_blank">x</a><a name="top">y</a>"##
        );
        assert_eq!(apply(r#"<a href="x">x</a>"#, None), r#"<a href="x">x</a>"#);
    }

    #[test]
    fn test_fill_empty_cells() {
        let mut doc = Document::parse("<table><tr><td> </td><th></th><td><img src=\"a\"></td><td>x</td></tr></table>").unwrap();
        fill_empty_cells(&mut doc);
        assert_eq!(
            doc.to_html(),
            "<table><tr><td> &nbsp;</td><th>&nbsp;</th><td><img src=\"a\"></td><td>x</td></tr></table>"
        );
    }
}
