// SPDX-License-Identifier: PMPL-1.0-or-later
//! Queries that are more than a single metric query.
//!
//! Arithmetic (`a{*} / b{*} * 100`), wrapping functions (`top(...)`,
//! `moving_rollup(...)`) and the like are kept as text. The only edit they
//! support is adding filters, which rewrites the `{...}` block of every
//! embedded metric query and leaves every other byte alone.

use tracing::{debug, instrument};

use mqb_grammar::{parse_with, GrammarConfig, Span};

use crate::bridge::ingest_filters;
use crate::error::QueryError;
use crate::expression::FilterExpression;
use crate::render::{render_filter_block, Render};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionQuery {
    original: String,
    added_filters: Vec<FilterExpression>,
    config: GrammarConfig,
}

impl ExpressionQuery {
    pub(crate) fn new(original: impl Into<String>, config: GrammarConfig) -> Self {
        Self {
            original: original.into(),
            added_filters: Vec::new(),
            config,
        }
    }

    /// Add a filter to every embedded metric query.
    pub fn filter(mut self, expr: impl Into<FilterExpression>) -> Self {
        self.added_filters.push(expr.into());
        self
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn added_filters(&self) -> &[FilterExpression] {
        &self.added_filters
    }
}

impl Render for ExpressionQuery {
    #[instrument(skip(self), fields(added = self.added_filters.len()))]
    fn build(&self) -> Result<String, QueryError> {
        if self.added_filters.is_empty() {
            return Ok(self.original.clone());
        }

        let expr = parse_with(&self.original, &self.config)?;

        let mut edits: Vec<(Span, String)> = Vec::new();
        for (i, mq) in expr.metric_queries().into_iter().enumerate() {
            let mut filters = ingest_filters(&mq.filters)
                .map_err(|e| e.context(format!("failed to ingest filters of '{}'", mq.metric)))?;
            filters.extend(self.added_filters.iter().cloned());
            let block = render_filter_block(&filters)
                .map_err(|e| e.context(format!("failed to build filters of metric query {i}")))?;
            edits.push((mq.filter_span, block));
        }
        debug!(metric_queries = edits.len(), "rewriting filter blocks");

        // back to front so earlier spans stay valid
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut out = self.original.clone();
        for (span, block) in edits {
            out.replace_range(span.start..span.end, &block);
        }
        Ok(out)
    }
}
