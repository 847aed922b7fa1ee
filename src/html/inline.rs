//! CSS inlining onto `style` attributes.
//!
//! Declarations cascade by `!important`, then origin (an existing `style`
//! attribute beats any stylesheet rule), then specificity, then source order.

use crate::{
    css::{
        Declaration, Item, Stylesheet,
        selector::{MatchMode, Selector, Specificity},
    },
    dom::{Document, NodeId, escape_attr},
    log,
};
use rustc_hash::FxHashMap;

/// Cascade rank; larger wins.
type Rank = (bool, bool, Specificity, usize);

struct Candidate {
    rank: Rank,
    property: String,
    value: String,
}

/// Inline `css` onto every matching element, then promote `width`/`height`
/// to attributes on `size_elements`.
pub fn inline_styles(doc: &mut Document, css: &str, size_elements: &[String]) {
    let sheet = Stylesheet::parse(css);
    let mut matched: FxHashMap<NodeId, Vec<Candidate>> = FxHashMap::default();
    let mut order = 0;

    let elements = doc.elements();
    for item in &sheet.items {
        let Item::Rule(rule) = item else {
            continue;
        };
        for text in &rule.selectors {
            let Some(selector) = Selector::parse(text) else {
                log!("warn"; "cannot inline unsupported selector `{text}`");
                continue;
            };
            let specificity = selector.specificity();
            for &id in &elements {
                if !selector.matches(doc, id, MatchMode::Static) {
                    continue;
                }
                let candidates = matched.entry(id).or_default();
                for (offset, decl) in rule.declarations.iter().enumerate() {
                    candidates.push(Candidate {
                        rank: (decl.important, false, specificity, order + offset),
                        property: decl.property.clone(),
                        value: decl.value.clone(),
                    });
                }
            }
            order += rule.declarations.len();
        }
    }

    for (id, mut candidates) in matched {
        let Some(elem) = doc.element_mut(id) else {
            continue;
        };
        let existing = elem
            .attr_decoded("style")
            .map(|style| Declaration::parse_list(&style))
            .unwrap_or_default();
        for (offset, decl) in existing.into_iter().enumerate() {
            candidates.push(Candidate {
                rank: (decl.important, true, (0, 0, 0), offset),
                property: decl.property,
                value: decl.value,
            });
        }
        candidates.sort_by(|a, b| a.rank.cmp(&b.rank));

        let mut resolved: Vec<(String, String)> = Vec::new();
        for candidate in candidates {
            match resolved.iter_mut().find(|(prop, _)| *prop == candidate.property) {
                Some(slot) => slot.1 = candidate.value,
                None => resolved.push((candidate.property, candidate.value)),
            }
        }

        let style = resolved
            .iter()
            .map(|(prop, value)| format!("{prop}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        elem.set_attr("style", &escape_attr(&style));

        if size_elements.iter().any(|name| *name == elem.name) {
            for (prop, value) in &resolved {
                if (prop == "width" || prop == "height")
                    && let Some(attr) = size_attribute(value)
                {
                    elem.set_attr_if_missing(prop, &attr);
                }
            }
        }
    }
}

/// Attribute form of a CSS length: unitless pixels or a percentage.
fn size_attribute(value: &str) -> Option<String> {
    let value = value.trim();
    let (number, suffix) = match value.strip_suffix("px") {
        Some(number) => (number.trim(), ""),
        None => match value.strip_suffix('%') {
            Some(number) => (number.trim(), "%"),
            None => (value, ""),
        },
    };
    number.parse::<f64>().ok()?;
    Some(format!("{number}{suffix}"))
}
