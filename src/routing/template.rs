//! Destination templates.
//!
//! # Responsibilities
//! - Parse a `to` string into literal text and capture-group references
//! - Expand the template against a set of regex captures
//!
//! # Syntax
//! - `$N` : Nth capture group, N is every decimal digit that follows
//! - `${N}` : same, for when a digit follows the reference
//! - `$name`, `${name}` : named group `(?P<name>...)`; a name is a letter or `_`
//!   followed by letters, digits and `_`
//! - `$$` : a literal `$`
//! - `$0` : the whole match
//!
//! A `$` followed by anything else is kept as a literal.

use regex::Captures;

/// Error produced while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unterminated '${{' at byte {0}")]
    Unterminated(usize),
    #[error("'${{{0}}}' is not a group number or name")]
    BadGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Group(usize),
    Named(String),
}

/// A compiled destination template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let bytes = source.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'$' {
                // Copy up to the next '$' in one go; keeps multi-byte chars intact.
                let next = source[i..].find('$').map_or(bytes.len(), |n| i + n);
                literal.push_str(&source[i..next]);
                i = next;
                continue;
            }

            match bytes.get(i + 1) {
                Some(b'$') => {
                    literal.push('$');
                    i += 2;
                }
                Some(b'{') => {
                    let close = source[i + 2..]
                        .find('}')
                        .ok_or(TemplateError::Unterminated(i))?;
                    let name = &source[i + 2..i + 2 + close];
                    let part = if let Ok(group) = name.parse::<usize>() {
                        Part::Group(group)
                    } else if is_group_name(name) {
                        Part::Named(name.to_string())
                    } else {
                        return Err(TemplateError::BadGroup(name.to_string()));
                    };
                    flush(&mut parts, &mut literal);
                    parts.push(part);
                    i += close + 3;
                }
                Some(b) if b.is_ascii_digit() => {
                    let digits = bytes[i + 1..]
                        .iter()
                        .take_while(|b| b.is_ascii_digit())
                        .count();
                    let name = &source[i + 1..i + 1 + digits];
                    let group = name
                        .parse::<usize>()
                        .map_err(|_| TemplateError::BadGroup(name.to_string()))?;
                    flush(&mut parts, &mut literal);
                    parts.push(Part::Group(group));
                    i += digits + 1;
                }
                Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {
                    let len = bytes[i + 1..]
                        .iter()
                        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
                        .count();
                    flush(&mut parts, &mut literal);
                    parts.push(Part::Named(source[i + 1..i + 1 + len].to_string()));
                    i += len + 1;
                }
                _ => {
                    literal.push('$');
                    i += 1;
                }
            }
        }
        flush(&mut parts, &mut literal);

        Ok(Self { parts })
    }

    /// Highest group number referenced, if any.
    pub fn max_group(&self) -> Option<usize> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Group(n) => Some(*n),
                _ => None,
            })
            .max()
    }

    /// Named groups referenced, in template order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Named(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Substitute captures into the template. Groups that did not participate
    /// in the match expand to the empty string.
    pub fn expand(&self, caps: &Captures<'_>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Group(n) => {
                    if let Some(m) = caps.get(*n) {
                        out.push_str(m.as_str());
                    }
                }
                Part::Named(name) => {
                    if let Some(m) = caps.name(name) {
                        out.push_str(m.as_str());
                    }
                }
            }
        }
        out
    }
}

fn is_group_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn flush(parts: &mut Vec<Part>, literal: &mut String) {
    if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(literal)));
    }
}
