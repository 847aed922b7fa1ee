//! Selector parsing, matching and specificity.
//!
//! Supports type, universal, class, id and attribute selectors, the four
//! combinators, the structural pseudo-classes (`:first-child`,
//! `:nth-of-type(2n+1)` and friends) and `:not(...)`.

use super::parse::split_top_level;
use crate::dom::{Document, NodeId};

/// User-action pseudo-classes. Rules using them cannot be inlined.
pub const DYNAMIC_PSEUDO_CLASSES: &[&str] = &["hover", "visited", "active", "focus"];

/// `(ids, classes + attributes + pseudo-classes, types + pseudo-elements)`
pub type Specificity = (u32, u32, u32);

/// How pseudo-classes without a static meaning are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Dynamic and unknown pseudo-classes never match. Used for inlining.
    Static,
    /// Dynamic pseudo-classes and pseudo-elements are ignored. Used to decide
    /// whether a selector could ever apply to the document.
    Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
}

/// `an+b` argument of the `:nth-*` pseudo-classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nth {
    step: i32,
    offset: i32,
}

impl Nth {
    fn parse(arg: &str) -> Option<Self> {
        let arg: String = arg
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match arg.as_str() {
            "odd" => return Some(Self { step: 2, offset: 1 }),
            "even" => return Some(Self { step: 2, offset: 0 }),
            _ => {}
        }
        let Some((a, b)) = arg.split_once('n') else {
            return Some(Self {
                step: 0,
                offset: arg.parse().ok()?,
            });
        };
        let step = match a {
            "" | "+" => 1,
            "-" => -1,
            a => a.parse().ok()?,
        };
        let offset = match b {
            "" => 0,
            b if b.starts_with(['+', '-']) => b.parse().ok()?,
            _ => return None,
        };
        Some(Self { step, offset })
    }

    /// Whether the 1-based `position` is `a*k + b` for some `k >= 0`.
    fn matches(self, position: i32) -> bool {
        if self.step == 0 {
            return position == self.offset;
        }
        let diff = position - self.offset;
        diff % self.step == 0 && diff / self.step >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
    Not(Vec<Selector>),
    Dynamic,
    Element,
    Unknown,
}

impl Pseudo {
    /// Whether the pseudo has a meaning on a static document.
    fn is_static(&self) -> bool {
        match self {
            Pseudo::Dynamic | Pseudo::Element | Pseudo::Unknown => false,
            Pseudo::Not(list) => list.iter().all(Selector::is_static),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

/// A single complex selector (no commas).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Compounds left to right; each after the first carries the combinator
    /// linking it to its left neighbour.
    parts: Vec<(Option<Combinator>, Compound)>,
}

impl Selector {
    /// Parse one selector. Returns `None` for syntax this module does not model.
    pub fn parse(text: &str) -> Option<Self> {
        SelectorParser::new(text).parse()
    }

    /// `:not(...)` counts as its most specific argument.
    pub fn specificity(&self) -> Specificity {
        self.parts.iter().fold((0, 0, 0), |(mut a, mut b, mut c), (_, compound)| {
            a += compound.ids.len() as u32;
            b += compound.classes.len() as u32 + compound.attrs.len() as u32;
            c += u32::from(compound.tag.is_some());
            for pseudo in &compound.pseudos {
                match pseudo {
                    Pseudo::Element => c += 1,
                    Pseudo::Not(list) => {
                        let (x, y, z) = list.iter().map(Selector::specificity).max().unwrap_or_default();
                        a += x;
                        b += y;
                        c += z;
                    }
                    _ => b += 1,
                }
            }
            (a, b, c)
        })
    }

    /// Whether the selector can be evaluated without user interaction or
    /// rendering, i.e. whether its declarations can be inlined.
    pub fn is_static(&self) -> bool {
        self.parts
            .iter()
            .all(|(_, compound)| compound.pseudos.iter().all(Pseudo::is_static))
    }

    pub fn matches(&self, doc: &Document, id: NodeId, mode: MatchMode) -> bool {
        !self.parts.is_empty() && self.matches_at(doc, id, self.parts.len() - 1, mode)
    }

    /// Whether any element in the document matches.
    pub fn matches_any(&self, doc: &Document, mode: MatchMode) -> bool {
        doc.elements().into_iter().any(|id| self.matches(doc, id, mode))
    }

    fn matches_at(&self, doc: &Document, id: NodeId, idx: usize, mode: MatchMode) -> bool {
        let (combinator, compound) = &self.parts[idx];
        if !compound.matches(doc, id, mode) {
            return false;
        }
        let Some(combinator) = combinator else {
            return true;
        };
        match combinator {
            Combinator::Child => doc
                .parent_element(id)
                .is_some_and(|p| self.matches_at(doc, p, idx - 1, mode)),
            Combinator::Descendant => {
                let mut current = doc.parent_element(id);
                while let Some(p) = current {
                    if self.matches_at(doc, p, idx - 1, mode) {
                        return true;
                    }
                    current = doc.parent_element(p);
                }
                false
            }
            Combinator::Adjacent => doc
                .preceding_element_siblings(id)
                .first()
                .is_some_and(|&s| self.matches_at(doc, s, idx - 1, mode)),
            Combinator::Sibling => doc
                .preceding_element_siblings(id)
                .into_iter()
                .any(|s| self.matches_at(doc, s, idx - 1, mode)),
        }
    }
}

impl Compound {
    fn matches(&self, doc: &Document, id: NodeId, mode: MatchMode) -> bool {
        let Some(elem) = doc.element(id) else {
            return false;
        };
        if self.tag.as_ref().is_some_and(|tag| *tag != elem.name) {
            return false;
        }
        if !self.ids.iter().all(|want| elem.id() == Some(want.as_str())) {
            return false;
        }
        if !self.classes.iter().all(|want| elem.classes().any(|c| c == want)) {
            return false;
        }
        let attrs_match = self.attrs.iter().all(|sel| {
            let Some(actual) = elem.attr_decoded(&sel.name) else {
                return false;
            };
            let want = sel.value.as_str();
            match sel.op {
                AttrOp::Exists => true,
                AttrOp::Equals => actual == want,
                AttrOp::Includes => actual.split_ascii_whitespace().any(|v| v == want),
                AttrOp::DashMatch => actual == want || actual.starts_with(&format!("{want}-")),
                AttrOp::Prefix => !want.is_empty() && actual.starts_with(want),
                AttrOp::Suffix => !want.is_empty() && actual.ends_with(want),
                AttrOp::Substring => !want.is_empty() && actual.contains(want),
            }
        });
        if !attrs_match {
            return false;
        }
        let same_type = |siblings: Vec<NodeId>| {
            siblings
                .into_iter()
                .filter(|&s| doc.element(s).is_some_and(|e| e.name == elem.name))
                .count() as i32
        };
        self.pseudos.iter().all(|pseudo| match pseudo {
            Pseudo::FirstChild => doc.preceding_element_siblings(id).is_empty(),
            Pseudo::LastChild => doc.following_element_siblings(id).is_empty(),
            Pseudo::OnlyChild => {
                doc.preceding_element_siblings(id).is_empty()
                    && doc.following_element_siblings(id).is_empty()
            }
            Pseudo::FirstOfType => same_type(doc.preceding_element_siblings(id)) == 0,
            Pseudo::LastOfType => same_type(doc.following_element_siblings(id)) == 0,
            Pseudo::OnlyOfType => {
                same_type(doc.preceding_element_siblings(id)) == 0
                    && same_type(doc.following_element_siblings(id)) == 0
            }
            Pseudo::NthChild(nth) => nth.matches(doc.preceding_element_siblings(id).len() as i32 + 1),
            Pseudo::NthLastChild(nth) => nth.matches(doc.following_element_siblings(id).len() as i32 + 1),
            Pseudo::NthOfType(nth) => nth.matches(same_type(doc.preceding_element_siblings(id)) + 1),
            Pseudo::NthLastOfType(nth) => nth.matches(same_type(doc.following_element_siblings(id)) + 1),
            Pseudo::Not(list) => {
                if mode == MatchMode::Presence && !list.iter().all(Selector::is_static) {
                    return true;
                }
                !list.iter().any(|sel| sel.matches(doc, id, mode))
            }
            Pseudo::Dynamic | Pseudo::Element | Pseudo::Unknown => mode == MatchMode::Presence,
        })
    }
}

/// Whether a selector uses one of the user-action pseudo-classes.
pub fn has_dynamic_pseudo(selector: &str) -> bool {
    let lower = selector.to_ascii_lowercase();
    DYNAMIC_PSEUDO_CLASSES.iter().any(|pseudo| {
        lower.match_indices(&format!(":{pseudo}")).any(|(idx, m)| {
            let next = lower[idx + m.len()..].chars().next();
            !next.is_some_and(|c| c.is_ascii_alphanumeric() || c == '-')
        })
    })
}

// ============================================================================
// Parser
// ============================================================================

struct SelectorParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> SelectorParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.trim().chars().peekable(),
        }
    }

    fn parse(mut self) -> Option<Selector> {
        let mut parts = Vec::new();
        let mut pending: Option<Combinator> = None;
        let mut saw_space = false;

        loop {
            match self.chars.peek().copied() {
                None => break,
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                    saw_space = true;
                }
                Some(c @ ('>' | '+' | '~')) => {
                    self.chars.next();
                    if parts.is_empty() || pending.is_some() {
                        return None;
                    }
                    pending = Some(match c {
                        '>' => Combinator::Child,
                        '+' => Combinator::Adjacent,
                        _ => Combinator::Sibling,
                    });
                    saw_space = false;
                }
                Some(_) => {
                    let compound = self.parse_compound()?;
                    let combinator = match (parts.is_empty(), pending.take()) {
                        (true, _) => None,
                        (false, Some(explicit)) => Some(explicit),
                        (false, None) if saw_space => Some(Combinator::Descendant),
                        (false, None) => return None,
                    };
                    parts.push((combinator, compound));
                    saw_space = false;
                }
            }
        }

        if parts.is_empty() || pending.is_some() {
            return None;
        }
        Some(Selector { parts })
    }

    fn parse_compound(&mut self) -> Option<Compound> {
        let mut compound = Compound::default();
        let mut consumed = false;
        while let Some(&c) = self.chars.peek() {
            match c {
                '*' => {
                    self.chars.next();
                }
                '#' => {
                    self.chars.next();
                    compound.ids.push(self.ident()?);
                }
                '.' => {
                    self.chars.next();
                    compound.classes.push(self.ident()?);
                }
                '[' => {
                    self.chars.next();
                    compound.attrs.push(self.attribute()?);
                }
                ':' => {
                    self.chars.next();
                    compound.pseudos.push(self.pseudo()?);
                }
                c if is_ident_char(c) && !consumed => {
                    compound.tag = Some(self.ident()?.to_ascii_lowercase());
                }
                _ => break,
            }
            consumed = true;
        }
        consumed.then_some(compound)
    }

    fn ident(&mut self) -> Option<String> {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '\\' {
                self.chars.next();
                out.push(self.chars.next()?);
            } else if is_ident_char(c) {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        (!out.is_empty()).then_some(out)
    }

    fn attribute(&mut self) -> Option<AttrSelector> {
        let mut inner = String::new();
        let mut quote = None;
        loop {
            let c = self.chars.next()?;
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '"' || c == '\'' => quote = Some(c),
                None if c == ']' => break,
                None => {}
            }
            inner.push(c);
        }

        let ops = [
            ("~=", AttrOp::Includes),
            ("|=", AttrOp::DashMatch),
            ("^=", AttrOp::Prefix),
            ("$=", AttrOp::Suffix),
            ("*=", AttrOp::Substring),
            ("=", AttrOp::Equals),
        ];
        for (token, op) in ops {
            if let Some((name, value)) = inner.split_once(token) {
                let value = value.trim();
                let value = value
                    .strip_prefix(['"', '\''])
                    .and_then(|v| v.strip_suffix(['"', '\'']))
                    .unwrap_or(value);
                return Some(AttrSelector {
                    name: name.trim().to_ascii_lowercase(),
                    op,
                    value: value.to_owned(),
                });
            }
        }
        let name = inner.trim().to_ascii_lowercase();
        (!name.is_empty()).then_some(AttrSelector {
            name,
            op: AttrOp::Exists,
            value: String::new(),
        })
    }

    fn pseudo(&mut self) -> Option<Pseudo> {
        let is_element = self.chars.peek() == Some(&':');
        if is_element {
            self.chars.next();
        }
        let name = self.ident()?.to_ascii_lowercase();
        if self.chars.peek() == Some(&'(') {
            self.chars.next();
            let arg = self.argument()?;
            return Some(functional_pseudo(&name, &arg));
        }
        if is_element || matches!(name.as_str(), "before" | "after" | "first-line" | "first-letter") {
            return Some(Pseudo::Element);
        }
        Some(match name.as_str() {
            "first-child" => Pseudo::FirstChild,
            "last-child" => Pseudo::LastChild,
            "only-child" => Pseudo::OnlyChild,
            n if DYNAMIC_PSEUDO_CLASSES.contains(&n) || n == "link" => Pseudo::Dynamic,
            "first-of-type" => Pseudo::FirstOfType,
            "last-of-type" => Pseudo::LastOfType,
            "only-of-type" => Pseudo::OnlyOfType,
            _ => Pseudo::Unknown,
        })
    }

    /// Text up to the parenthesis closing an already consumed `(`.
    fn argument(&mut self) -> Option<String> {
        let mut out = String::new();
        let mut depth = 1;
        loop {
            let c = self.chars.next()?;
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(out);
                    }
                }
                _ => {}
            }
            out.push(c);
        }
    }
}

fn functional_pseudo(name: &str, arg: &str) -> Pseudo {
    let nth = |wrap: fn(Nth) -> Pseudo| Nth::parse(arg).map_or(Pseudo::Unknown, wrap);
    match name {
        "nth-child" => nth(Pseudo::NthChild),
        "nth-last-child" => nth(Pseudo::NthLastChild),
        "nth-of-type" => nth(Pseudo::NthOfType),
        "nth-last-of-type" => nth(Pseudo::NthLastOfType),
        "not" => split_top_level(arg, ',')
            .into_iter()
            .map(Selector::parse)
            .collect::<Option<Vec<_>>>()
            .map_or(Pseudo::Unknown, Pseudo::Not),
        _ => Pseudo::Unknown,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

// ============================================================================
// Tests
// ============================================================================
