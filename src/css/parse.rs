//! Lenient CSS parser.

use super::{AtBody, AtRule, Declaration, Item, NESTED_AT_RULES, Rule};

pub(super) struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.src[self.pos..].starts_with(pat)
    }

    fn skip_comment(&mut self) {
        match self.src[self.pos + 2..].find("*/") {
            Some(end) => self.pos += 2 + end + 2,
            None => self.pos = self.src.len(),
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            if self.starts_with("/*") {
                self.skip_comment();
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Read until one of `stops` at nesting depth zero, outside strings.
    /// Comments are dropped. The stop character is consumed and returned.
    fn read_until(&mut self, stops: &[char]) -> (String, Option<char>) {
        let mut out = String::new();
        let mut depth = 0usize;
        while let Some(ch) = self.peek() {
            if self.starts_with("/*") {
                self.skip_comment();
                continue;
            }
            if depth == 0 && stops.contains(&ch) {
                self.bump();
                return (out, Some(ch));
            }
            self.bump();
            match ch {
                '"' | '\'' => {
                    out.push(ch);
                    self.read_string(ch, &mut out);
                    continue;
                }
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ => {}
            }
            out.push(ch);
        }
        (out, None)
    }

    fn read_string(&mut self, quote: char, out: &mut String) {
        while let Some(ch) = self.bump() {
            out.push(ch);
            if ch == '\\' {
                if let Some(escaped) = self.bump() {
                    out.push(escaped);
                }
            } else if ch == quote {
                break;
            }
        }
    }

    /// Parse items until end of input, or until the closing `}` when nested.
    pub fn parse_items(&mut self, nested: bool) -> Vec<Item> {
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_comments();
            match self.peek() {
                None => break,
                Some('}') => {
                    self.bump();
                    if nested {
                        break;
                    }
                }
                Some('@') => {
                    self.bump();
                    if let Some(at) = self.parse_at_rule() {
                        items.push(Item::AtRule(at));
                    }
                }
                Some(_) => {
                    if let Some(rule) = self.parse_rule() {
                        items.push(Item::Rule(rule));
                    }
                }
            }
        }
        items
    }

    fn parse_rule(&mut self) -> Option<Rule> {
        let (prelude, stop) = self.read_until(&['{', ';', '}']);
        if stop != Some('{') {
            return None;
        }
        let (body, _) = self.read_until(&['}']);
        let selectors: Vec<String> = split_top_level(&prelude, ',')
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if selectors.is_empty() {
            return None;
        }
        Some(Rule {
            selectors,
            declarations: parse_declarations(&body),
        })
    }

    fn parse_at_rule(&mut self) -> Option<AtRule> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            self.bump();
        }
        let name = self.src[start..self.pos].to_ascii_lowercase();
        let (prelude, stop) = self.read_until(&['{', ';', '}']);
        let prelude = prelude.trim().to_owned();

        let body = match stop {
            Some('{') if NESTED_AT_RULES.contains(&name.as_str()) => {
                AtBody::Rules(self.parse_items(true))
            }
            Some('{') => {
                let (body, _) = self.read_until(&['}']);
                AtBody::Declarations(parse_declarations(&body))
            }
            // a stray `}` ends the statement; let the caller see it again
            Some('}') => {
                self.pos -= 1;
                AtBody::None
            }
            _ => AtBody::None,
        };

        if name.is_empty() {
            return None;
        }
        Some(AtRule {
            name,
            prelude,
            body,
        })
    }
}

/// Split on `sep` outside strings, parentheses and brackets.
pub(super) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

pub(super) fn parse_declarations(text: &str) -> Vec<Declaration> {
    let mut decls = Vec::new();
    let mut body = String::new();
    // comments may appear inside declaration blocks
    let mut parser = Parser::new(text);
    while parser.peek().is_some() {
        let (chunk, _) = parser.read_until(&[]);
        body.push_str(&chunk);
    }

    for part in split_top_level(&body, ';') {
        let Some((property, value)) = part.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let mut value = value.trim();
        let mut important = false;
        if let Some(idx) = value.rfind('!')
            && value[idx + 1..].trim().eq_ignore_ascii_case("important")
        {
            important = true;
            value = value[..idx].trim_end();
        }
        if property.is_empty() || value.is_empty() {
            continue;
        }
        decls.push(Declaration {
            property,
            value: value.to_owned(),
            important,
        });
    }
    decls
}
