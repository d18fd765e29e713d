// SPDX-License-Identifier: PMPL-1.0-or-later
//! Search and in-place edits over a query's filter tree.
//!
//! Groups are addressed by [`GroupPath`], a list of child indices starting at
//! the top-level filter list. Paths are plain values: they can be held across
//! edits, and a path that no longer points at a group is simply not found.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::expression::FilterExpression;
use crate::group::{FilterGroup, GroupOperator};
use crate::metric::MetricQuery;

/// Location of a group inside a filter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupPath(Vec<usize>);

impl GroupPath {
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// Pre-order: a group is tested before any of its children.
fn search<F>(
    exprs: &[FilterExpression],
    prefix: &mut Vec<usize>,
    predicate: &mut F,
) -> Option<GroupPath>
where
    F: FnMut(&FilterGroup) -> bool,
{
    for (i, expr) in exprs.iter().enumerate() {
        let FilterExpression::Group(group) = expr else {
            continue;
        };
        prefix.push(i);
        if predicate(group) {
            return Some(GroupPath(prefix.clone()));
        }
        if let Some(found) = search(group.children(), prefix, predicate) {
            return Some(found);
        }
        prefix.pop();
    }
    None
}

fn resolve<'a>(exprs: &'a [FilterExpression], path: &[usize]) -> Option<&'a FilterGroup> {
    let (first, rest) = path.split_first()?;
    let group = exprs.get(*first)?.as_group()?;
    if rest.is_empty() {
        Some(group)
    } else {
        resolve(group.children(), rest)
    }
}

fn resolve_mut<'a>(
    exprs: &'a mut [FilterExpression],
    path: &[usize],
) -> Option<&'a mut FilterGroup> {
    let (first, rest) = path.split_first()?;
    let group = exprs.get_mut(*first)?.as_group_mut()?;
    if rest.is_empty() {
        Some(group)
    } else {
        resolve_mut(group.children_mut(), rest)
    }
}

impl MetricQuery {
    /// First group, depth-first and parent before children, that satisfies
    /// `predicate`.
    ///
    /// ```
    /// use mqb_builder::{filter, group, metric, GroupOperator};
    ///
    /// let query = metric("m").filter(filter("host").equal("a")).filter(
    ///     group().or(filter("env").equal("prod")).or(filter("env").equal("dev")),
    /// );
    /// let path = query.find_group(|g| g.operator() == GroupOperator::Or).unwrap();
    /// assert_eq!(path.indices(), &[1]);
    /// ```
    pub fn find_group<F>(&self, mut predicate: F) -> Option<GroupPath>
    where
        F: FnMut(&FilterGroup) -> bool,
    {
        search(&self.filters, &mut Vec::new(), &mut predicate)
    }

    /// The group at `path`, if it still exists.
    pub fn group(&self, path: &GroupPath) -> Option<&FilterGroup> {
        resolve(&self.filters, &path.0)
    }

    /// Append `expr` to the group at `path` without changing its operator.
    ///
    /// With no path, or a path that no longer resolves to a group, `expr` is
    /// appended as a new top-level filter instead.
    pub fn add_to_group(mut self, path: Option<GroupPath>, expr: impl Into<FilterExpression>) -> Self {
        let expr = expr.into();
        let Some(path) = path else {
            self.filters.push(expr);
            return self;
        };

        match resolve_mut(&mut self.filters, &path.0) {
            Some(group) => {
                let operator: GroupOperator = group.operator();
                debug!(path = %path, %operator, "appending to filter group");
                group.append(expr);
            }
            None => {
                warn!(path = %path, "group path did not resolve, appending at top level");
                self.filters.push(expr);
            }
        }
        self
    }
}
