//! Owned HTML document model.
//!
//! An arena of nodes parsed once from rendered markup, mutated in place by
//! each post-processing stage and serialized back to a string. Text and
//! attribute values keep their raw (already escaped) markup form so that a
//! parse/serialize cycle never changes entities the template emitted.

mod parse;

use std::borrow::Cow;

pub type NodeId = usize;

/// Elements that never have a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[inline]
pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Raw attribute value as it appears between the quotes.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    pub attrs: Vec<Attribute>,
    /// Written as `<name/>` in the source.
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    pub fn with_attrs(name: &str, attrs: &[(&str, &str)]) -> Self {
        let mut elem = Self::new(name);
        for (key, value) in attrs {
            elem.set_attr(key, &escape_attr(value));
        }
        elem
    }

    /// Raw value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Attribute value with entities decoded.
    pub fn attr_decoded(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attr(name).map(decode_entities)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|attr| attr.name == name)
    }

    /// Set a raw attribute value, replacing any existing one.
    pub fn set_attr(&mut self, name: &str, raw_value: &str) {
        match self.attrs.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = raw_value.to_owned(),
            None => self.attrs.push(Attribute {
                name: name.to_owned(),
                value: raw_value.to_owned(),
            }),
        }
    }

    /// Set an attribute only when absent. Returns whether it was added.
    pub fn set_attr_if_missing(&mut self, name: &str, raw_value: &str) -> bool {
        if self.has_attr(name) {
            return false;
        }
        self.set_attr(name, raw_value);
        true
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element(Element),
    /// Raw text, entities kept as written.
    Text(String),
    /// Comment body without the `<!--` `-->` delimiters.
    Comment(String),
    /// CDATA and processing instructions, passed through verbatim.
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }
}

impl Document {
    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id].kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id].kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Parent, if it is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.element(p).is_some())
    }

    /// Element siblings preceding `id`, nearest first.
    pub fn preceding_element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(id) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&s| s == id).unwrap_or(0);
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .filter(|&s| self.element(s).is_some())
            .collect()
    }

    /// Element siblings following `id`, nearest first.
    pub fn following_element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(id) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&s| s == id).unwrap_or(0);
        siblings[pos + 1..]
            .iter()
            .copied()
            .filter(|&s| self.element(s).is_some())
            .collect()
    }

    /// All attached nodes below `id` in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// All attached elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(Self::ROOT)
            .into_iter()
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    /// Attached elements with the given tag name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(|e| e.name == name))
            .collect()
    }

    pub fn find_first(&self, name: &str) -> Option<NodeId> {
        self.find_all(name).into_iter().next()
    }

    fn alloc(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind, parent);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind, parent);
        let children = &mut self.nodes[parent].children;
        children.insert(index.min(children.len()), id);
        id
    }

    /// Append text, merging with a trailing text node.
    pub fn append_text(&mut self, parent: NodeId, raw: &str) {
        if let Some(&last) = self.nodes[parent].children.last()
            && let NodeKind::Text(text) = &mut self.nodes[last].kind
        {
            text.push_str(raw);
            return;
        }
        self.append_child(parent, NodeKind::Text(raw.to_owned()));
    }

    /// Unlink a node from its parent. Its subtree becomes unreachable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, raw: &str) {
        for child in self.nodes[id].children.clone() {
            self.detach(child);
        }
        self.append_child(id, NodeKind::Text(raw.to_owned()));
    }

    /// Concatenated raw text of all descendant text nodes.
    pub fn raw_text(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match &self.nodes[n].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_children(Self::ROOT, &mut out);
        out
    }

    fn write_children(&self, id: NodeId, out: &mut String) {
        for &child in self.children(id) {
            self.write_node(child, out);
        }
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Root => self.write_children(id, out),
            NodeKind::Element(elem) => {
                out.push('<');
                out.push_str(&elem.name);
                for attr in &elem.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&attr.value.replace('"', "&quot;"));
                    out.push('"');
                }
                let childless = self.children(id).is_empty();
                if childless && elem.self_closing && !is_void(&elem.name) {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                if is_void(&elem.name) && childless {
                    return;
                }
                self.write_children(id, out);
                out.push_str("</");
                out.push_str(&elem.name);
                out.push('>');
            }
            NodeKind::Text(text) | NodeKind::Raw(text) => out.push_str(text),
            NodeKind::Comment(body) => {
                out.push_str("<!--");
                out.push_str(body);
                out.push_str("-->");
            }
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Escape a plain value for use inside a double-quoted attribute.
pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Decode XML-predefined, numeric and common HTML named entities.
///
/// Unknown references are left as written.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';').filter(|&end| end <= 12) {
            Some(end) => match resolve_entity(&tail[1..end]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "zwnj" => '\u{200c}',
        _ => return None,
    };
    Some(ch)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_building() {
        let mut doc = Document::default();
        let table = doc.append_child(Document::ROOT, NodeKind::Element(Element::new("TABLE")));
        let td = doc.append_child(table, NodeKind::Element(Element::new("td")));
        doc.append_text(td, "a");
        doc.append_text(td, "&amp;b");

        assert_eq!(doc.children(td).len(), 1);
        assert_eq!(doc.to_html(), "<table><td>a&amp;b</td></table>");
        assert_eq!(doc.find_first("td"), Some(td));
        assert_eq!(doc.parent_element(td), doc.find_first("table"));
    }

    #[test]
    fn test_detach_hides_subtree() {
        let mut doc = Document::default();
        let div = doc.append_child(Document::ROOT, NodeKind::Element(Element::new("div")));
        let span = doc.append_child(div, NodeKind::Element(Element::new("span")));
        doc.detach(div);

        assert!(doc.elements().is_empty());
        assert!(!doc.find_all("span").contains(&span));
        assert_eq!(doc.to_html(), "");
    }

    #[test]
    fn test_void_and_self_closing_serialization() {
        let mut doc = Document::default();
        doc.append_child(
            Document::ROOT,
            NodeKind::Element(Element::with_attrs("img", &[("src", "a.png")])),
        );
        let mut custom = Element::new("o:AllowPNG");
        custom.self_closing = true;
        doc.append_child(Document::ROOT, NodeKind::Element(custom));

        assert_eq!(doc.to_html(), r#"<img src="a.png"><o:allowpng/>"#);
    }

    #[test]
    fn test_attribute_helpers() {
        let mut elem = Element::with_attrs("a", &[("href", "/x?a=1&b=2"), ("class", "btn  big")]);
        assert_eq!(elem.attr("href"), Some("/x?a=1&amp;b=2"));
        assert_eq!(elem.attr_decoded("href").as_deref(), Some("/x?a=1&b=2"));
        assert_eq!(elem.classes().collect::<Vec<_>>(), vec!["btn", "big"]);

        assert!(!elem.set_attr_if_missing("href", "other"));
        assert!(elem.set_attr_if_missing("target", "_blank"));
        assert!(!elem.has_attr("style"));
    }

    #[test]
    fn test_sibling_navigation() {
        let mut doc = Document::default();
        let ul = doc.append_child(Document::ROOT, NodeKind::Element(Element::new("ul")));
        let a = doc.append_child(ul, NodeKind::Element(Element::new("li")));
        doc.append_text(ul, " ");
        let b = doc.append_child(ul, NodeKind::Element(Element::new("li")));
        let c = doc.append_child(ul, NodeKind::Element(Element::new("li")));

        assert_eq!(doc.preceding_element_siblings(c), vec![b, a]);
        assert_eq!(doc.following_element_siblings(a), vec![b, c]);
        assert_eq!(doc.parent_element(a), Some(ul));
        assert_eq!(doc.parent_element(ul), None);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("plain"), "plain");
        assert_eq!(decode_entities("a &amp; b&nbsp;c"), "a & b\u{a0}c");
        assert_eq!(decode_entities("&#8220;x&#x201D;"), "\u{201c}x\u{201d}");
        assert_eq!(decode_entities("&unknown; & done"), "&unknown; & done");
    }
}
