// SPDX-License-Identifier: PMPL-1.0-or-later
//! mqb builder
//!
//! Fluent construction and round-trip editing of metric queries of the form
//! `[agg[(window)]:]metric{filters}[ by {groups}][.fn(args)...]`.
//! Filters form a tree of single predicates and AND/OR groups that renders
//! to comma form (`{a:1, b:2}`) when flat and to explicit boolean form
//! (`{(a:1 AND (b:2 OR b:3))}`) as soon as a group is involved.
//!
//! Parsed queries ingest into the same tree as built ones, so an existing
//! query can be searched, extended in place and rendered back out.

pub mod bridge;
pub mod error;
pub mod expression;
pub mod filter;
pub mod function;
pub mod group;
pub mod metric;
pub mod navigator;
pub mod passthrough;
pub mod query;
pub mod render;

pub use bridge::{ingest_filters, ingest_metric_query};
pub use error::{ErrorKind, QueryError};
pub use expression::FilterExpression;
pub use filter::{Filter, FilterOperation};
pub use function::Function;
pub use group::{FilterGroup, GroupOperator};
pub use metric::MetricQuery;
pub use mqb_grammar::{GrammarConfig, GrammarError};
pub use navigator::GroupPath;
pub use passthrough::ExpressionQuery;
pub use query::{parse_query, parse_query_with, ParsedQuery};
pub use render::{render_filter_block, Render};

/// Start a query on `name`.
pub fn metric(name: impl Into<String>) -> MetricQuery {
    MetricQuery::new().metric(name)
}

/// Start a filter on tag `key`.
pub fn filter(key: impl Into<String>) -> Filter {
    Filter::new(key)
}

/// Start an empty group; its operator is fixed by the first `and`/`or`.
pub fn group() -> FilterGroup {
    FilterGroup::new()
}

/// Start a function call `.name(...)` to chain after the query.
pub fn function(name: impl Into<String>) -> Function {
    Function::new(name)
}

/// Everything needed to build and edit queries.
pub mod prelude {
    pub use crate::{
        filter, function, group, metric, parse_query, Filter, FilterExpression, FilterGroup,
        Function, GroupOperator, MetricQuery, ParsedQuery, QueryError, Render,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_builder_entry_points() {
        let query = metric("system.cpu.idle")
            .aggregator("max")
            .filter(filter("host").equal("web-1"))
            .filter(
                group()
                    .or(filter("env").equal("prod"))
                    .or(filter("env").equal("staging"))
                    .not(),
            )
            .function(function("fill").arg("null"));
        assert_eq!(
            query.build().unwrap(),
            "max:system.cpu.idle{(host:web-1 AND NOT (env:prod OR env:staging))}.fill(null)"
        );
    }

    #[test]
    fn test_edit_parsed_query_in_place() {
        let query = parse_query("sum:requests{service:web AND (status:500 OR status:502)}")
            .unwrap()
            .into_metric()
            .unwrap();
        let path = query.find_group(|g| g.operator() == GroupOperator::Or);
        assert!(path.is_some());
        let query = query.add_to_group(path, filter("status").equal("503"));
        assert_eq!(
            query.build().unwrap(),
            "sum:requests{(service:web AND (status:500 OR status:502 OR status:503))}"
        );
    }
}
