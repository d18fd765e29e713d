// SPDX-License-Identifier: PMPL-1.0-or-later
//! Parsing query strings into an editable form.

use std::str::FromStr;

use tracing::{debug, instrument};

use mqb_grammar::{parse_with, Expr, GrammarConfig};

use crate::bridge::ingest_metric_query;
use crate::error::QueryError;
use crate::expression::FilterExpression;
use crate::metric::MetricQuery;
use crate::passthrough::ExpressionQuery;
use crate::render::Render;

/// Result of [`parse_query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedQuery {
    /// The whole input is one metric query; fully editable.
    Metric(MetricQuery),
    /// Anything larger; kept as text, filters can still be added.
    Expression(ExpressionQuery),
}

impl ParsedQuery {
    /// Add a top-level filter, to every metric query for expressions.
    pub fn filter(self, expr: impl Into<FilterExpression>) -> Self {
        match self {
            ParsedQuery::Metric(query) => ParsedQuery::Metric(query.filter(expr)),
            ParsedQuery::Expression(query) => ParsedQuery::Expression(query.filter(expr)),
        }
    }

    pub fn as_metric(&self) -> Option<&MetricQuery> {
        match self {
            ParsedQuery::Metric(query) => Some(query),
            ParsedQuery::Expression(_) => None,
        }
    }

    pub fn into_metric(self) -> Option<MetricQuery> {
        match self {
            ParsedQuery::Metric(query) => Some(query),
            ParsedQuery::Expression(_) => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, ParsedQuery::Expression(_))
    }
}

impl Render for ParsedQuery {
    fn build(&self) -> Result<String, QueryError> {
        match self {
            ParsedQuery::Metric(query) => query.build(),
            ParsedQuery::Expression(query) => query.build(),
        }
    }
}

/// Parse `input` with the default [`GrammarConfig`].
///
/// ```
/// use mqb_builder::{filter, parse_query, Render};
///
/// let query = parse_query("avg(5m):system.cpu.idle{host:web-1}")
///     .unwrap()
///     .filter(filter("env").equal("prod"));
/// assert_eq!(query.build().unwrap(), "avg(5m):system.cpu.idle{host:web-1, env:prod}");
/// ```
pub fn parse_query(input: &str) -> Result<ParsedQuery, QueryError> {
    parse_query_with(input, &GrammarConfig::default())
}

/// Parse `input` with explicit grammar limits.
///
/// # Errors
///
/// Returns a parse-kind [`QueryError`] when the input does not match the
/// grammar or its filters cannot be represented.
#[instrument(skip(config), fields(len = input.len()))]
pub fn parse_query_with(input: &str, config: &GrammarConfig) -> Result<ParsedQuery, QueryError> {
    let expr = parse_with(input, config)?;
    match expr {
        Expr::Metric(ref ast) => {
            let query = ingest_metric_query(ast)?;
            Ok(ParsedQuery::Metric(query))
        }
        other => {
            debug!(
                metric_queries = other.metric_queries().len(),
                "query is an expression, keeping text"
            );
            Ok(ParsedQuery::Expression(ExpressionQuery::new(
                input,
                config.clone(),
            )))
        }
    }
}

impl FromStr for ParsedQuery {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_query(s)
    }
}
