//! Minimal CSS object model.
//!
//! Enough structure to partition compiled stylesheets, force `!important`,
//! merge media queries, inline rules and drop unused selectors. Parsing is
//! lenient: anything unrecognized is skipped rather than reported.

mod parse;
pub mod selector;

pub use selector::{MatchMode, Selector, Specificity};

/// At-rules whose block holds nested rules rather than declarations.
const NESTED_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "-moz-document",
    "container",
    "layer",
    "keyframes",
    "-webkit-keyframes",
    "-moz-keyframes",
];

/// At-rules where `!important` is either meaningless or invalid.
const IMPORTANT_EXEMPT_AT_RULES: &[&str] =
    &["font-face", "keyframes", "-webkit-keyframes", "-moz-keyframes"];

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Rule(Rule),
    AtRule(AtRule),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Comma-separated selector list, each entry trimmed.
    pub selectors: Vec<String>,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    /// Lowercased name without the `@`.
    pub name: String,
    pub prelude: String,
    pub body: AtBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtBody {
    /// Statement at-rule such as `@import url(x.css);`.
    None,
    Rules(Vec<Item>),
    Declarations(Vec<Declaration>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name.
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        Self {
            items: parse::Parser::new(css).parse_items(false),
        }
    }

    /// Mark every declaration `!important`, except inside font-face and keyframes.
    pub fn force_important(&mut self) {
        force_important(&mut self.items);
    }

    /// Serialize without insignificant whitespace. Empty rules are dropped.
    pub fn to_minified(&self) -> String {
        let mut out = String::new();
        write_items(&self.items, &mut out);
        out
    }
}

impl AtRule {
    pub fn is_media(&self) -> bool {
        self.name == "media"
    }
}

impl Declaration {
    /// Parse a declaration list such as the body of a `style` attribute.
    pub fn parse_list(text: &str) -> Vec<Declaration> {
        parse::parse_declarations(text)
    }

    pub fn to_minified(&self) -> String {
        let mut out = format!("{}:{}", self.property, minify_value(&self.value));
        if self.important {
            out.push_str("!important");
        }
        out
    }
}

/// Parse and re-serialize minified.
pub fn minify(css: &str) -> String {
    Stylesheet::parse(css).to_minified()
}

fn force_important(items: &mut [Item]) {
    for item in items {
        match item {
            Item::Rule(rule) => rule.declarations.iter_mut().for_each(|d| d.important = true),
            Item::AtRule(at) if IMPORTANT_EXEMPT_AT_RULES.contains(&at.name.as_str()) => {}
            Item::AtRule(at) => match &mut at.body {
                AtBody::Rules(nested) => force_important(nested),
                AtBody::Declarations(decls) => decls.iter_mut().for_each(|d| d.important = true),
                AtBody::None => {}
            },
        }
    }
}

// ============================================================================
// Minified Serialization
// ============================================================================

fn write_items(items: &[Item], out: &mut String) {
    for item in items {
        match item {
            Item::Rule(rule) => write_rule(rule, out),
            Item::AtRule(at) => write_at_rule(at, out),
        }
    }
}

fn write_rule(rule: &Rule, out: &mut String) {
    if rule.declarations.is_empty() || rule.selectors.is_empty() {
        return;
    }
    let selectors: Vec<String> = rule.selectors.iter().map(|s| minify_selector(s)).collect();
    out.push_str(&selectors.join(","));
    write_declarations(&rule.declarations, out);
}

fn write_declarations(decls: &[Declaration], out: &mut String) {
    out.push('{');
    let body: Vec<String> = decls.iter().map(Declaration::to_minified).collect();
    out.push_str(&body.join(";"));
    out.push('}');
}

fn write_at_rule(at: &AtRule, out: &mut String) {
    let mut head = format!("@{}", at.name);
    if !at.prelude.is_empty() {
        head.push(' ');
        head.push_str(&minify_prelude(&at.prelude));
    }
    match &at.body {
        AtBody::None => {
            out.push_str(&head);
            out.push(';');
        }
        AtBody::Rules(nested) => {
            let mut inner = String::new();
            write_items(nested, &mut inner);
            if !inner.is_empty() {
                out.push_str(&head);
                out.push('{');
                out.push_str(&inner);
                out.push('}');
            }
        }
        AtBody::Declarations(decls) => {
            out.push_str(&head);
            write_declarations(decls, out);
        }
    }
}

/// Collapse whitespace outside quotes and apply `squeeze` to drop spaces
/// around the given punctuation.
fn collapse(text: &str, squeeze: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    for ch in text.trim().chars() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let last_squeezed = out.chars().last().is_some_and(|c| squeeze.contains(&c));
            if !squeeze.contains(&ch) && !last_squeezed {
                out.push(' ');
            }
            pending_space = false;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
        }
        out.push(ch);
    }
    out
}

pub fn minify_selector(selector: &str) -> String {
    collapse(selector, &['>', '+', '~', ','])
}

pub fn minify_value(value: &str) -> String {
    collapse(value, &[','])
}

fn minify_prelude(prelude: &str) -> String {
    let collapsed = collapse(prelude, &[',', ':']);
    collapsed.replace("( ", "(").replace(" )", ")")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_rules() {
        let css = "table {\n  background: orange;\n}\n\na {\n  text-decoration: none;\n}\n";
        assert_eq!(minify(css), "table{background:orange}a{text-decoration:none}");
    }

    #[test]
    fn test_minify_media_prelude() {
        let css = "@media only screen and (max-width: 600px) {\n  td > a { width: 100% !important; }\n}";
        assert_eq!(
            minify(css),
            "@media only screen and (max-width:600px){td>a{width:100%!important}}"
        );
    }

    #[test]
    fn test_minify_drops_empty_rules() {
        assert_eq!(minify("tr {} td { }"), "");
        assert_eq!(minify("@media print { tr {} }"), "");
    }

    #[test]
    fn test_minify_keeps_quoted_whitespace() {
        let css = r#"body { font-family: "Helvetica  Neue", Arial , sans-serif; }"#;
        assert_eq!(minify(css), r#"body{font-family:"Helvetica  Neue",Arial,sans-serif}"#);
    }

    #[test]
    fn test_force_important_skips_font_face() {
        let mut sheet = Stylesheet::parse(
            "a:hover{color:red}@font-face{font-family:X;src:url(x.woff)}@media (max-width:600px){td{width:100%}}",
        );
        sheet.force_important();
        assert_eq!(
            sheet.to_minified(),
            "a:hover{color:red!important}@font-face{font-family:X;src:url(x.woff)}@media (max-width:600px){td{width:100%!important}}"
        );
    }

    #[test]
    fn test_force_important_skips_keyframes() {
        let mut sheet = Stylesheet::parse("@keyframes spin{from{opacity:0}to{opacity:1}}");
        sheet.force_important();
        assert_eq!(sheet.to_minified(), "@keyframes spin{from{opacity:0}to{opacity:1}}");
    }

    #[test]
    fn test_statement_at_rule() {
        let css = "@import url(\"https://fonts.example/css\");\na{color:red}";
        assert_eq!(minify(css), "@import url(\"https://fonts.example/css\");a{color:red}");
    }

    #[test]
    fn test_declaration_to_minified() {
        let decl = Declaration {
            property: "margin".into(),
            value: "0  auto".into(),
            important: true,
        };
        assert_eq!(decl.to_minified(), "margin:0 auto!important");
    }
}
