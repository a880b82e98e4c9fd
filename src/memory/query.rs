//! Selector engine for the in-memory host.
//!
//! Supports selector lists of compound selectors built from `*`, a type
//! selector, `#id`, `.class`, `[attr]` and `[attr=value]` (value bare or
//! quoted). Combinators and pseudo-classes are reported as unsupported.
//!
//! Quoted attribute values may hold any character except their own quote,
//! including commas, spaces and colons.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::MatchError;

use super::dom::ElementData;

fn compound_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^(\*|[A-Za-z][A-Za-z0-9-]*)?((?:[#.][A-Za-z_][\w-]*|\[[A-Za-z_][\w-]*(?:=(?:"[^"]*"|'[^']*'|[\w-]+))?\])*)$"#,
        )
        .expect("compound selector grammar is a valid regex")
    })
}

fn simple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"([#.])([A-Za-z_][\w-]*)|\[([A-Za-z_][\w-]*)(?:=(?:"([^"]*)"|'([^']*)'|([\w-]+)))?\]"#,
        )
        .expect("simple selector grammar is a valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
}

impl Simple {
    fn matches(&self, el: &ElementData) -> bool {
        match self {
            Self::Id(id) => el.id() == Some(id.as_str()),
            Self::Class(class) => el.has_class(class),
            Self::Attribute { name, value: None } => el.attribute(name).is_some(),
            Self::Attribute {
                name,
                value: Some(value),
            } => el.attribute(name) == Some(value.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    /// `None` for the universal selector or when omitted.
    tag: Option<String>,
    parts: Vec<Simple>,
}

impl Compound {
    fn parse(selector: &str, text: &str) -> Result<Self, MatchError> {
        if text.is_empty() {
            return Err(MatchError::InvalidSelector {
                selector: selector.to_string(),
                reason: "empty compound selector".to_string(),
            });
        }
        let Some(caps) = compound_re().captures(text) else {
            return Err(Self::classify(selector, text));
        };

        let tag = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|t| *t != "*")
            .map(str::to_ascii_lowercase);

        let rest = caps.get(2).map_or("", |m| m.as_str());
        let mut parts = Vec::new();
        for simple in simple_re().captures_iter(rest) {
            if let (Some(kind), Some(name)) = (simple.get(1), simple.get(2)) {
                let name = name.as_str().to_string();
                parts.push(if kind.as_str() == "#" {
                    Simple::Id(name)
                } else {
                    Simple::Class(name)
                });
            } else if let Some(name) = simple.get(3) {
                let value = simple
                    .get(4)
                    .or_else(|| simple.get(5))
                    .or_else(|| simple.get(6))
                    .map(|m| m.as_str().to_string());
                parts.push(Simple::Attribute {
                    name: name.as_str().to_ascii_lowercase(),
                    value,
                });
            }
        }

        Ok(Self { tag, parts })
    }

    /// Explains why `text` is not a compound selector. Quoted values are
    /// ignored so `[title="a b"]` is never mistaken for a combinator.
    fn classify(selector: &str, text: &str) -> MatchError {
        let bare = unquoted(text);
        if bare.contains(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~')) {
            MatchError::Unsupported {
                selector: selector.to_string(),
                reason: "combinators are not supported".to_string(),
            }
        } else if bare.contains(':') {
            MatchError::Unsupported {
                selector: selector.to_string(),
                reason: "pseudo-classes are not supported".to_string(),
            }
        } else {
            MatchError::InvalidSelector {
                selector: selector.to_string(),
                reason: format!("cannot parse '{text}'"),
            }
        }
    }

    fn matches(&self, el: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if tag != el.tag() {
                return false;
            }
        }
        self.parts.iter().all(|p| p.matches(el))
    }
}

/// A parsed, comma separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(Vec<Compound>);

impl SelectorList {
    /// Parses a selector list.
    pub fn parse(selector: &str) -> Result<Self, MatchError> {
        split_list(selector)
            .into_iter()
            .map(|part| Compound::parse(selector, part.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Returns true if any selector of the list matches `el`.
    #[must_use]
    pub fn matches(&self, el: &ElementData) -> bool {
        self.0.iter().any(|c| c.matches(el))
    }
}

/// Splits on commas outside quotes and attribute brackets.
fn split_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts
}

/// `text` with every quoted run removed, quotes included.
fn unquoted(text: &str) -> String {
    let mut quote = None;
    text.chars()
        .filter(|&c| match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                false
            }
            None if matches!(c, '"' | '\'') => {
                quote = Some(c);
                false
            }
            None => true,
        })
        .collect()
}
