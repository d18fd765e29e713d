// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rendering of query parts to canonical text.

use crate::error::QueryError;
use crate::expression::FilterExpression;
use crate::group::{join_children, GroupOperator};

/// Anything that renders to query text.
///
/// Rendering never mutates: a failed `build` leaves the value untouched and
/// safe to fix and build again.
pub trait Render {
    fn build(&self) -> Result<String, QueryError>;
}

/// Render the contents of a `{...}` filter block (braces excluded).
///
/// - no filters: `*`
/// - only plain filters: comma form, `a:1, b:2`
/// - at least one group: every filter folded into one explicit AND,
///   `(a:1 AND (b:2 OR b:3))`, since commas cannot sit next to `AND`/`OR`.
pub fn render_filter_block(filters: &[FilterExpression]) -> Result<String, QueryError> {
    if filters.is_empty() {
        return Ok("*".to_string());
    }

    if filters.iter().any(FilterExpression::is_group) {
        return join_children(filters, GroupOperator::And, false);
    }

    let parts = filters
        .iter()
        .enumerate()
        .map(|(i, filter)| {
            filter
                .build()
                .map_err(|e| e.context(format!("failed to build filter {i}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(", "))
}
