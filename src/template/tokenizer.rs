//! Splits a pattern into literal and variable chunks.
//!
//! Only outer braces delimit a variable. Braces inside a variable's
//! constraint nest, so `{year:\d{4}}` is a single chunk.

use std::fmt;

use regex::Regex;

use crate::error::PatternError;

/// One parsed piece of a template.
#[derive(Debug, Clone)]
pub(crate) enum Chunk {
    Literal(String),
    Variable(Variable),
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Variable(var) => var.fmt(f),
        }
    }
}

/// A named placeholder with an optional constraint regex.
#[derive(Debug, Clone)]
pub(crate) struct Variable {
    pub name: String,
    pub constraint: Option<Constraint>,
}

/// Constraint source plus its anchored form for whole-value checks.
#[derive(Debug, Clone)]
pub(crate) struct Constraint {
    pub source: String,
    anchored: Regex,
}

impl Variable {
    /// Whether `value` satisfies the constraint (always true without one).
    pub fn accepts(&self, value: &str) -> bool {
        self.constraint
            .as_ref()
            .is_none_or(|c| c.anchored.is_match(value))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(c) => write!(f, "{{{}:{}}}", self.name, c.source),
            None => write!(f, "{{{}}}", self.name),
        }
    }
}

/// Tokenize `pattern` into chunks, tracking brace depth.
pub(crate) fn tokenize(pattern: &str) -> Result<Vec<Chunk>, PatternError> {
    let mut chunks = Vec::new();
    let mut outside = true;
    let mut level = 0usize;
    let mut last = 0usize;

    for (idx, ch) in pattern.char_indices() {
        match ch {
            '{' if outside => {
                if last < idx {
                    chunks.push(Chunk::Literal(pattern[last..idx].to_string()));
                }
                last = idx;
                outside = false;
            }
            '{' => level += 1,
            '}' if !outside => {
                if level > 0 {
                    level -= 1;
                } else {
                    let token = &pattern[last..=idx];
                    chunks.push(Chunk::Variable(parse_variable(pattern, token)?));
                    last = idx + 1;
                    outside = true;
                }
            }
            _ => {}
        }
    }

    if !outside {
        return Err(PatternError::Unterminated {
            pattern: pattern.to_string(),
            offset: last,
        });
    }
    if last < pattern.len() {
        chunks.push(Chunk::Literal(pattern[last..].to_string()));
    }

    Ok(chunks)
}

/// Parse a `{name}` or `{name:constraint}` token (braces included).
fn parse_variable(pattern: &str, token: &str) -> Result<Variable, PatternError> {
    let invalid = || PatternError::InvalidVariable {
        pattern: pattern.to_string(),
        chunk: token.to_string(),
    };

    let inner = token[1..token.len() - 1].trim();
    let (name_part, constraint_part) = match inner.split_once(':') {
        Some((name, rest)) => (name, Some(rest)),
        None => (inner, None),
    };

    let name = name_part.trim_end_matches(' ');
    if !is_variable_name(name) {
        return Err(invalid());
    }

    let constraint = match constraint_part {
        None => None,
        Some("") => return Err(invalid()),
        Some(source) => {
            let source = source.trim();
            let anchored = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
                PatternError::InvalidConstraint {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            Some(Constraint {
                source: source.to_string(),
                anchored,
            })
        }
    };

    Ok(Variable {
        name: name.to_string(),
        constraint,
    })
}

/// A word character followed by word characters, dashes or dots.
fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_word_char(first) => {
            chars.all(|c| is_word_char(c) || c == '-' || c == '.')
        }
        _ => false,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
