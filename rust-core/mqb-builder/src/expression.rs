// SPDX-License-Identifier: PMPL-1.0-or-later
//! A node of a filter tree: a single filter or a group of them.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::filter::Filter;
use crate::group::FilterGroup;
use crate::render::Render;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterExpression {
    Filter(Filter),
    Group(FilterGroup),
}

impl FilterExpression {
    pub fn is_group(&self) -> bool {
        matches!(self, FilterExpression::Group(_))
    }

    pub fn as_group(&self) -> Option<&FilterGroup> {
        match self {
            FilterExpression::Group(group) => Some(group),
            FilterExpression::Filter(_) => None,
        }
    }

    pub fn as_filter(&self) -> Option<&Filter> {
        match self {
            FilterExpression::Filter(filter) => Some(filter),
            FilterExpression::Group(_) => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut FilterGroup> {
        match self {
            FilterExpression::Group(group) => Some(group),
            FilterExpression::Filter(_) => None,
        }
    }
}

impl Render for FilterExpression {
    fn build(&self) -> Result<String, QueryError> {
        match self {
            FilterExpression::Filter(filter) => filter.build(),
            FilterExpression::Group(group) => group.build(),
        }
    }
}

impl From<Filter> for FilterExpression {
    fn from(filter: Filter) -> Self {
        FilterExpression::Filter(filter)
    }
}

impl From<FilterGroup> for FilterExpression {
    fn from(group: FilterGroup) -> Self {
        FilterExpression::Group(group)
    }
}
