//! Head/inline partitioning of compiled stylesheets.
//!
//! Head-bound: every at-rule, every rule whose selector uses a user-action
//! pseudo-class, and every rule with a selector that cannot be matched
//! against a static document (`:link`, pseudo-elements, unsupported syntax).
//! Inline-bound: everything else. Each rule lands on exactly one side.

use crate::{
    css::{
        AtBody, AtRule, Item, Rule, Stylesheet,
        selector::{Selector, has_dynamic_pseudo},
    },
    log,
};

#[derive(Debug, Default)]
pub struct Partition {
    pub head: Stylesheet,
    pub inline: Stylesheet,
}

impl Partition {
    /// Split a compiled stylesheet in source order.
    pub fn split(sheet: Stylesheet) -> Self {
        let mut partition = Self::default();
        for item in sheet.items {
            let head_bound = match &item {
                Item::AtRule(_) => true,
                Item::Rule(rule) => !inlinable(rule),
            };
            if head_bound {
                partition.head.items.push(item);
            } else {
                partition.inline.items.push(item);
            }
        }
        partition
    }

    /// Split out only what cannot be inlined, for sheets that are otherwise
    /// inlined wholesale.
    pub fn split_inlinable(sheet: Stylesheet) -> Self {
        let (head, inline) = sheet.items.into_iter().partition(|item| match item {
            Item::AtRule(_) => true,
            Item::Rule(rule) => !inlinable(rule),
        });
        Self {
            head: Stylesheet { items: head },
            inline: Stylesheet { items: inline },
        }
    }

    /// Minified head CSS: forced `!important`, media queries merged last.
    pub fn head_css(&self) -> String {
        let mut head = self.head.clone();
        head.force_important();
        head.items = merge_media_queries(head.items);
        head.to_minified()
    }

    pub fn inline_css(&self) -> String {
        self.inline.to_minified()
    }
}

/// Whether every selector of `rule` can be resolved while inlining.
fn inlinable(rule: &Rule) -> bool {
    rule.selectors.iter().all(|text| {
        if has_dynamic_pseudo(text) {
            return false;
        }
        let static_match = Selector::parse(text).is_some_and(|sel| sel.is_static());
        if !static_match {
            log!("warn"; "selector `{text}` cannot be inlined, keeping the rule in head");
        }
        static_match
    })
}

/// Merge `@media` blocks with identical queries and move them after all
/// other items, keeping first-appearance order.
pub fn merge_media_queries(items: Vec<Item>) -> Vec<Item> {
    let mut rest = Vec::new();
    let mut media: Vec<AtRule> = Vec::new();

    for item in items {
        match item {
            Item::AtRule(at) if at.is_media() => {
                let key = normalize_query(&at.prelude);
                let AtBody::Rules(children) = at.body else {
                    continue;
                };
                match media.iter().position(|m| normalize_query(&m.prelude) == key) {
                    Some(idx) => {
                        if let AtBody::Rules(existing) = &mut media[idx].body {
                            existing.extend(children);
                        }
                    }
                    None => media.push(AtRule {
                        name: at.name,
                        prelude: at.prelude,
                        body: AtBody::Rules(children),
                    }),
                }
            }
            other => rest.push(other),
        }
    }

    rest.extend(media.into_iter().map(Item::AtRule));
    rest
}

fn normalize_query(prelude: &str) -> String {
    prelude
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(": ", ":")
}
