// SPDX-License-Identifier: PMPL-1.0-or-later
//! The metric query builder.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::expression::FilterExpression;
use crate::function::Function;
use crate::render::{render_filter_block, Render};

/// `[agg[(window)]:]metric{filters}[ by {groups}][.fn(args)...]`
///
/// Built up through chained setters that take and return `self`; nothing is
/// validated until [`Render::build`], which borrows and never mutates.
///
/// ```
/// use mqb_builder::{filter, metric, Render};
///
/// let query = metric("system.cpu.idle")
///     .aggregator("avg")
///     .time_window("5m")
///     .filter(filter("host").equal("web-1"))
///     .group_by("host");
/// assert_eq!(query.build().unwrap(), "avg(5m):system.cpu.idle{host:web-1} by {host}");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricQuery {
    pub(crate) metric: String,
    pub(crate) aggregator: Option<String>,
    pub(crate) time_window: Option<String>,
    pub(crate) filters: Vec<FilterExpression>,
    pub(crate) group_by: Vec<String>,
    pub(crate) functions: Vec<Function>,
}

impl MetricQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(mut self, name: impl Into<String>) -> Self {
        self.metric = name.into();
        self
    }

    /// Space aggregator (`avg`, `sum`, ...). An empty string clears it.
    pub fn aggregator(mut self, aggregator: impl Into<String>) -> Self {
        self.aggregator = non_empty(aggregator.into());
        self
    }

    /// Rendered only alongside an aggregator. An empty string clears it.
    pub fn time_window(mut self, window: impl Into<String>) -> Self {
        self.time_window = non_empty(window.into());
        self
    }

    pub fn filter(mut self, expr: impl Into<FilterExpression>) -> Self {
        self.filters.push(expr.into());
        self
    }

    pub fn filters<I, E>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<FilterExpression>,
    {
        self.filters.extend(exprs.into_iter().map(Into::into));
        self
    }

    pub fn group_by(mut self, tag: impl Into<String>) -> Self {
        self.group_by.push(tag.into());
        self
    }

    /// Append several group-by tags, in order.
    pub fn group_by_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    pub fn metric_name(&self) -> &str {
        &self.metric
    }

    pub fn aggregator_name(&self) -> Option<&str> {
        self.aggregator.as_deref()
    }

    pub fn window(&self) -> Option<&str> {
        self.time_window.as_deref()
    }

    pub fn filter_list(&self) -> &[FilterExpression] {
        &self.filters
    }

    pub fn groups(&self) -> &[String] {
        &self.group_by
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Snapshot the model as JSON.
    pub fn to_json(&self) -> Result<String, QueryError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl Render for MetricQuery {
    fn build(&self) -> Result<String, QueryError> {
        if self.metric.is_empty() {
            return Err(QueryError::Validation("metric name is required".to_string()));
        }

        let mut out = String::new();
        if let Some(agg) = self.aggregator.as_deref().filter(|a| !a.is_empty()) {
            out.push_str(agg);
            if let Some(window) = self.time_window.as_deref().filter(|w| !w.is_empty()) {
                out.push('(');
                out.push_str(window);
                out.push(')');
            }
            out.push(':');
        }

        out.push_str(&self.metric);
        out.push('{');
        out.push_str(
            &render_filter_block(&self.filters).map_err(|e| e.context("failed to build filters"))?,
        );
        out.push('}');

        if !self.group_by.is_empty() {
            out.push_str(" by {");
            out.push_str(&self.group_by.join(", "));
            out.push('}');
        }

        for (i, function) in self.functions.iter().enumerate() {
            let rendered = function
                .build()
                .map_err(|e| e.context(format!("failed to build function {i}")))?;
            out.push_str(&rendered);
        }

        Ok(out)
    }
}
