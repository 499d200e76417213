//! Route-like pattern templates.
//!
//! A template is a readable pattern such as `"what is {a} plus {b}"` that
//! compiles to a regular expression. Literal text is matched as-is (with a
//! handful of regex metacharacters escaped), `{name}` matches a run of
//! non-slash characters, and `{name:regex}` matches the given constraint.
//!
//! A template:
//! - extracts named values from an input with [`Template::match_input`];
//! - rebuilds a string from named values with [`Template::substitute`].
//!
//! Templates are immutable once compiled and can be shared across threads.

mod tokenizer;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::{PatternError, SubstituteError};
use tokenizer::{Chunk, tokenize};

/// Reserved key holding whatever the trailing `(/.*)?` group absorbed.
pub const FINAL_MATCH_GROUP: &str = "FINAL_MATCH_GROUP";

const LIMITED_REGEX_SUFFIX: &str = "(/.*)?";
const DEFAULT_VARIABLE_REGEX: &str = "([^/]+?)";
const CHARACTERS_TO_ESCAPE: &str = ".*+$()";

/// A compiled pattern template.
#[derive(Debug, Clone)]
pub struct Template {
    raw: String,
    chunks: Vec<Chunk>,
    variables: Vec<String>,
    custom_variables: Vec<String>,
    literals: String,
    pattern_value: String,
    regex: Regex,
}

/// Values extracted by a successful match.
///
/// Each variable maps to a list; it normally holds one value. The
/// [`FINAL_MATCH_GROUP`] entry is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateMatch {
    values: HashMap<String, Vec<String>>,
}

impl TemplateMatch {
    /// All values captured for `name`.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// First value captured for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// The trailing remainder absorbed by the permissive suffix.
    pub fn final_group(&self) -> &str {
        self.first(FINAL_MATCH_GROUP).unwrap_or_default()
    }

    /// Names of the captured variables, excluding the reserved key.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|k| *k != FINAL_MATCH_GROUP)
    }

    /// Consume into the raw name-to-values map.
    pub fn into_map(self) -> HashMap<String, Vec<String>> {
        self.values
    }
}

impl Template {
    /// Compile `pattern` into a template.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let chunks = tokenize(pattern)?;

        let mut variables = Vec::new();
        let mut custom_variables = Vec::new();
        let mut literals = String::new();
        let mut body = String::new();

        for chunk in &chunks {
            match chunk {
                Chunk::Literal(text) => {
                    let escaped = escape_characters(text);
                    literals.push_str(&escaped);
                    body.push_str(&escaped);
                }
                Chunk::Variable(var) => {
                    variables.push(var.name.clone());
                    match &var.constraint {
                        Some(c) => {
                            custom_variables.push(var.name.clone());
                            body.push('(');
                            body.push_str(&c.source);
                            body.push(')');
                        }
                        None => body.push_str(DEFAULT_VARIABLE_REGEX),
                    }
                }
            }
        }

        if body.ends_with('/') {
            body.pop();
        }
        body.push_str(LIMITED_REGEX_SUFFIX);

        let regex = Regex::new(&format!("^(?:{body})$")).map_err(|e| {
            PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            raw: pattern.to_string(),
            chunks,
            variables,
            custom_variables,
            literals,
            pattern_value: body,
            regex,
        })
    }

    /// The pattern text this template was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The generated regular expression (unanchored form).
    pub fn pattern_value(&self) -> &str {
        &self.pattern_value
    }

    /// Concatenated literal text, escaped as it appears in the regex.
    pub fn literal_chars(&self) -> &str {
        &self.literals
    }

    /// Variable names in order of appearance.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Variables that carry an explicit constraint.
    pub fn custom_variables(&self) -> &[String] {
        &self.custom_variables
    }

    /// Whether the whole of `input` matches.
    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    /// Match `input` and extract variable values.
    ///
    /// An absent input never matches. When constraints introduce extra
    /// capture groups, empty or non-participating groups are skipped so a
    /// later non-empty group can be assigned to the variable instead.
    pub fn match_input(&self, input: Option<&str>) -> Option<TemplateMatch> {
        let caps = self.regex.captures(input?)?;
        let group_count = caps.len() - 1;
        let ambiguous = self.variables.len() + 1 < group_count;

        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        let mut i = 1;
        for name in &self.variables {
            while i <= group_count {
                let value = caps.get(i).map(|m| m.as_str());
                i += 1;
                let skippable = match value {
                    None => true,
                    Some(v) => v.is_empty() && i < group_count,
                };
                if skippable && ambiguous {
                    continue;
                }
                values
                    .entry(name.clone())
                    .or_default()
                    .push(value.unwrap_or_default().to_string());
                break;
            }
        }

        let final_group = caps.get(group_count).map_or("", |m| m.as_str());
        values.insert(FINAL_MATCH_GROUP.to_string(), vec![final_group.to_string()]);

        Some(TemplateMatch { values })
    }

    /// Fill placeholders from `values`.
    ///
    /// Values must satisfy their variable's constraint. Variables named in
    /// `encode_slashes` get `/` replaced by `%2F`. A missing value is an
    /// error unless `allow_unresolved`, in which case the placeholder is
    /// written back verbatim.
    pub fn substitute(
        &self,
        values: &HashMap<String, String>,
        encode_slashes: &HashSet<String>,
        allow_unresolved: bool,
    ) -> Result<String, SubstituteError> {
        let mut out = String::new();
        for chunk in &self.chunks {
            let var = match chunk {
                Chunk::Literal(text) => {
                    out.push_str(text);
                    continue;
                }
                Chunk::Variable(var) => var,
            };

            match values.get(&var.name) {
                Some(value) => {
                    check_constraint(var, value)?;
                    if encode_slashes.contains(&var.name) {
                        out.push_str(&value.replace('/', "%2F"));
                    } else {
                        out.push_str(value);
                    }
                }
                None if allow_unresolved => out.push_str(&var.to_string()),
                None => {
                    return Err(SubstituteError::MissingVariable {
                        name: var.name.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Substitute with no slash encoding and no unresolved placeholders.
    pub fn substitute_map(&self, values: &HashMap<String, String>) -> Result<String, SubstituteError> {
        self.substitute(values, &HashSet::new(), false)
    }

    /// Fill placeholders in order of appearance. Placeholders beyond the
    /// supplied values are written back verbatim.
    pub fn substitute_positional<S: AsRef<str>>(&self, values: &[S]) -> Result<String, SubstituteError> {
        let mut iter = values.iter();
        let mut out = String::new();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Variable(var) => match iter.next() {
                    Some(value) => {
                        let value = value.as_ref();
                        check_constraint(var, value)?;
                        out.push_str(value);
                    }
                    None => out.push_str(&var.to_string()),
                },
                Chunk::Literal(text) => out.push_str(text),
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn check_constraint(var: &tokenizer::Variable, value: &str) -> Result<(), SubstituteError> {
    if var.accepts(value) {
        return Ok(());
    }
    Err(SubstituteError::ConstraintViolation {
        name: var.name.clone(),
        value: value.to_string(),
        constraint: var
            .constraint
            .as_ref()
            .map(|c| c.source.clone())
            .unwrap_or_default(),
    })
}

fn escape_characters(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if CHARACTERS_TO_ESCAPE.contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
