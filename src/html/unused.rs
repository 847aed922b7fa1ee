//! Removal of head CSS selectors that match nothing in the document.

use crate::{
    css::{AtBody, Item, Stylesheet, selector::{MatchMode, Selector}},
    dom::Document,
};

/// Rewrite every `<style>` in head without unused selectors.
///
/// Selectors containing a `whitelist` fragment, and selectors that cannot be
/// parsed, are always kept. User-action and unknown pseudo-classes are
/// matched on presence of the element alone.
pub fn remove_unused_css(doc: &mut Document, whitelist: &[String]) {
    let Some(head) = doc.find_first("head") else {
        return;
    };
    let styles: Vec<_> = doc
        .descendants(head)
        .into_iter()
        .filter(|&id| doc.element(id).is_some_and(|e| e.name == "style"))
        .collect();

    for style in styles {
        let mut sheet = Stylesheet::parse(&doc.raw_text(style));
        retain_used(doc, &mut sheet.items, whitelist);
        doc.set_text(style, &sheet.to_minified());
    }
}

fn retain_used(doc: &Document, items: &mut Vec<Item>, whitelist: &[String]) {
    items.retain_mut(|item| match item {
        Item::Rule(rule) => {
            rule.selectors.retain(|text| is_used(doc, text, whitelist));
            !rule.selectors.is_empty()
        }
        Item::AtRule(at) => {
            if let AtBody::Rules(children) = &mut at.body {
                retain_used(doc, children, whitelist);
            }
            true
        }
    });
}

fn is_used(doc: &Document, text: &str, whitelist: &[String]) -> bool {
    if whitelist.iter().any(|fragment| text.contains(fragment.as_str())) {
        return true;
    }
    match Selector::parse(text) {
        Some(selector) => selector.matches_any(doc, MatchMode::Presence),
        None => true,
    }
}
