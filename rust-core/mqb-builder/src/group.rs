// SPDX-License-Identifier: PMPL-1.0-or-later
//! Boolean combinators over filters and nested groups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::expression::FilterExpression;
use crate::render::Render;

/// Operator joining the children of a [`FilterGroup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    #[default]
    And,
    Or,
}

impl GroupOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupOperator::And => "AND",
            GroupOperator::Or => "OR",
        }
    }
}

impl fmt::Display for GroupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `AND`/`OR` over an ordered list of children, optionally negated.
///
/// The operator is fixed by whichever of [`and`](Self::and) or
/// [`or`](Self::or) inserts the first child. Later calls only append:
/// `group().and(a).or(b)` is still an AND group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    children: Vec<FilterExpression>,
    #[serde(default)]
    operator: GroupOperator,
    #[serde(default)]
    negated: bool,
}

impl FilterGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(self, expr: impl Into<FilterExpression>) -> Self {
        self.push_child(GroupOperator::And, expr.into())
    }

    pub fn or(self, expr: impl Into<FilterExpression>) -> Self {
        self.push_child(GroupOperator::Or, expr.into())
    }

    /// Negate the whole group. Calling it again has no further effect.
    pub fn not(mut self) -> Self {
        self.negated = true;
        self
    }

    pub fn children(&self) -> &[FilterExpression] {
        &self.children
    }

    pub fn operator(&self) -> GroupOperator {
        self.operator
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    fn push_child(mut self, operator: GroupOperator, expr: FilterExpression) -> Self {
        if self.children.is_empty() {
            self.operator = operator;
        }
        self.children.push(expr);
        self
    }

    /// Append in place, keeping the current operator.
    pub(crate) fn append(&mut self, expr: FilterExpression) {
        self.children.push(expr);
    }

    pub(crate) fn set_operator(&mut self, operator: GroupOperator) {
        self.operator = operator;
    }

    /// Flip negation; unlike [`not`](Self::not), applying it twice restores
    /// the group.
    pub(crate) fn toggle_negation(&mut self) {
        self.negated = !self.negated;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<FilterExpression> {
        &mut self.children
    }

    pub(crate) fn from_parts(
        operator: GroupOperator,
        children: Vec<FilterExpression>,
        negated: bool,
    ) -> Self {
        Self {
            children,
            operator,
            negated,
        }
    }
}

impl Render for FilterGroup {
    fn build(&self) -> Result<String, QueryError> {
        join_children(&self.children, self.operator, self.negated)
    }
}

/// Render `children` joined by `operator`.
///
/// Parenthesized only with more than one child; `NOT ` goes in front of the
/// parentheses.
pub(crate) fn join_children(
    children: &[FilterExpression],
    operator: GroupOperator,
    negated: bool,
) -> Result<String, QueryError> {
    if children.is_empty() {
        return Err(QueryError::Validation(
            "filter group must have at least one child".to_string(),
        ));
    }

    let parts = children
        .iter()
        .enumerate()
        .map(|(i, child)| {
            child
                .build()
                .map_err(|e| e.context(format!("failed to build child {i} of filter group")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let joined = parts.join(&format!(" {operator} "));
    let body = if parts.len() > 1 {
        format!("({joined})")
    } else {
        joined
    };

    Ok(if negated { format!("NOT {body}") } else { body })
}
