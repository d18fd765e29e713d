// SPDX-License-Identifier: PMPL-1.0-or-later
//! Single tag predicates: `key:value`, `key!:value`, `key:~pattern`,
//! `key IN (a,b)` and `key NOT IN (a,b)`.

use std::borrow::Cow;
use std::fmt;

use mqb_grammar::{is_key_char, is_value_char};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::render::Render;

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperation {
    Equal,
    NotEqual,
    Regex,
    In,
    NotIn,
}

impl FilterOperation {
    /// Whether the operation takes a list of values rather than exactly one.
    pub fn is_list(self) -> bool {
        matches!(self, FilterOperation::In | FilterOperation::NotIn)
    }
}

impl fmt::Display for FilterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperation::Equal => write!(f, "equal"),
            FilterOperation::NotEqual => write!(f, "not equal"),
            FilterOperation::Regex => write!(f, "regex"),
            FilterOperation::In => write!(f, "in"),
            FilterOperation::NotIn => write!(f, "not in"),
        }
    }
}

/// A `key <op> value(s)` predicate; the leaf of a filter tree.
///
/// Each operation setter replaces both the operation and the values, so a
/// filter is never left half-updated. Nothing is checked until
/// [`Render::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    key: String,
    /// `None` until an operation setter is called.
    #[serde(default)]
    operation: Option<FilterOperation>,
    #[serde(default)]
    values: Vec<String>,
}

impl Filter {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operation: None,
            values: Vec::new(),
        }
    }

    /// `key:value`
    pub fn equal(self, value: impl Into<String>) -> Self {
        self.set(FilterOperation::Equal, vec![value.into()])
    }

    /// `key!:value`
    pub fn not_equal(self, value: impl Into<String>) -> Self {
        self.set(FilterOperation::NotEqual, vec![value.into()])
    }

    /// `key:~pattern`
    pub fn regex(self, pattern: impl Into<String>) -> Self {
        self.set(FilterOperation::Regex, vec![pattern.into()])
    }

    /// `key IN (v1,v2,...)`
    pub fn is_in<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            FilterOperation::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    /// `key NOT IN (v1,v2,...)`
    pub fn not_in<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            FilterOperation::NotIn,
            values.into_iter().map(Into::into).collect(),
        )
    }

    fn set(mut self, operation: FilterOperation, values: Vec<String>) -> Self {
        self.operation = Some(operation);
        self.values = values;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operation(&self) -> Option<FilterOperation> {
        self.operation
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl Render for Filter {
    fn build(&self) -> Result<String, QueryError> {
        if self.key.is_empty() {
            return Err(QueryError::Validation("filter key is required".to_string()));
        }
        let Some(operation) = self.operation else {
            return Err(QueryError::Validation(format!(
                "filter '{}' has no operation set",
                self.key
            )));
        };

        if operation.is_list() {
            if self.values.is_empty() {
                return Err(QueryError::Validation(format!(
                    "{operation} filter '{}' requires at least one value",
                    self.key
                )));
            }
        } else if self.values.len() != 1 {
            return Err(QueryError::Validation(format!(
                "{operation} filter '{}' requires exactly one value, got {}",
                self.key,
                self.values.len()
            )));
        }

        if !self.key.chars().all(is_key_char) {
            return Err(QueryError::Validation(format!(
                "filter key '{}' may only contain letters, digits and '_-./@'",
                self.key
            )));
        }
        if self.values.iter().any(String::is_empty) {
            return Err(QueryError::Validation(format!(
                "{operation} filter '{}' has an empty value",
                self.key
            )));
        }

        let key = &self.key;
        let values: Vec<Cow<'_, str>> = self.values.iter().map(|v| render_value(v)).collect();
        Ok(match operation {
            FilterOperation::Equal => format!("{key}:{}", values[0]),
            FilterOperation::NotEqual => format!("{key}!:{}", values[0]),
            FilterOperation::Regex => format!("{key}:~{}", values[0]),
            FilterOperation::In => format!("{key} IN ({})", values.join(",")),
            FilterOperation::NotIn => format!("{key} NOT IN ({})", values.join(",")),
        })
    }
}

/// Value text as it must appear in a query.
///
/// Bare when every character is allowed unquoted, verbatim when it already is
/// a complete string literal (as kept by ingestion), otherwise wrapped in
/// double quotes with `\` and `"` escaped.
fn render_value(value: &str) -> Cow<'_, str> {
    let bare = !value.starts_with(['\'', '"']) && value.chars().all(is_value_char);
    if bare || is_string_literal(value) {
        return Cow::Borrowed(value);
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

/// Whether `value` is exactly one quoted literal, escapes included.
fn is_string_literal(value: &str) -> bool {
    let mut chars = value.char_indices();
    let Some((_, quote @ ('\'' | '"'))) = chars.next() else {
        return false;
    };
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if chars.next().is_none() {
                return false;
            }
        } else if c == quote {
            return i + c.len_utf8() == value.len();
        }
    }
    false
}
