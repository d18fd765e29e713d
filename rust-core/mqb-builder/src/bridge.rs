// SPDX-License-Identifier: PMPL-1.0-or-later
//!
//! Grammar AST to query model bridge.
//!
//! The grammar hands over a filter block as a flat list of operands and
//! separator tokens, with only parenthesized sub-lists nested. This module
//! folds that list into the [`FilterExpression`] tree used by the builder, so
//! a parsed query and a freshly built one are the same type and render through
//! the same code.
//!
//! ## Separator handling
//!
//! | token               | effect                                                    |
//! |---------------------|-----------------------------------------------------------|
//! | `,`                 | closes the open group; operands stay separate top-level filters |
//! | `AND` / `OR`        | opens a group around the previous operand, or retargets the open one |
//! | `AND NOT` / `OR NOT`| as `AND` / `OR`, and negates the next operand             |
//! | `NOT`               | negates the next operand; `NOT NOT` cancels out           |
//!
//! `AND` and `OR` at the same level do not nest: the last one seen decides the
//! operator of the whole run, so `a OR b AND c` ingests as `(a AND b AND c)`.

use tracing::debug;

use mqb_grammar::{Comparator, FilterValue, MetricQueryAst, Param, SeparatorKind, SimpleFilter};

use crate::error::QueryError;
use crate::expression::FilterExpression;
use crate::filter::Filter;
use crate::function::Function;
use crate::group::{FilterGroup, GroupOperator};
use crate::metric::MetricQuery;

// ---------------------------------------------------------------------------
// Conversion: MetricQueryAst -> MetricQuery
// ---------------------------------------------------------------------------

/// Convert a parsed metric query into a [`MetricQuery`].
///
/// 1. Copies aggregator, window and metric name.
/// 2. Folds the filter block into filter expressions (see [`ingest_filters`]).
/// 3. Copies group-by tags and function calls, arguments verbatim.
///
/// # Errors
///
/// Returns `QueryError::Parse` if the filter block has a shape the model
/// cannot represent.
pub fn ingest_metric_query(ast: &MetricQueryAst) -> Result<MetricQuery, QueryError> {
    let filters = ingest_filters(&ast.filters)
        .map_err(|e| e.context(format!("failed to ingest filters of '{}'", ast.metric)))?;

    debug!(
        metric = %ast.metric,
        filters = filters.len(),
        groups = filters.iter().filter(|f| f.is_group()).count(),
        functions = ast.functions.len(),
        "ingested metric query"
    );

    let mut query = MetricQuery::new()
        .metric(ast.metric.as_str())
        .filters(filters)
        .group_by_tags(ast.group_by.iter().cloned());
    if let Some(ref agg) = ast.aggregator {
        query = query.aggregator(agg.as_str());
    }
    if let Some(ref window) = ast.time_window {
        query = query.time_window(window.as_str());
    }
    for call in &ast.functions {
        query = query.function(Function::new(call.name.as_str()).args(call.args.iter().cloned()));
    }
    Ok(query)
}

/// Fold a flat parameter list into filter expressions.
///
/// # Errors
///
/// Returns `QueryError::Parse` for an operand with an empty key or no values,
/// a separator with nothing to its left or right, two operands with no
/// separator between them, or an empty parenthesized group.
pub fn ingest_filters(params: &[Param]) -> Result<Vec<FilterExpression>, QueryError> {
    let mut state = Ingest::default();
    for param in params {
        match param {
            Param::Wildcard => {}
            Param::Simple(simple) => state.operand(convert_simple(simple)?)?,
            Param::Grouped(inner) => state.operand(convert_grouped(inner)?.into())?,
            Param::Separator(kind) => state.separator(*kind)?,
        }
    }
    state.finish()
}

// ---------------------------------------------------------------------------
// Fold state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Ingest {
    expressions: Vec<FilterExpression>,
    current_group: Option<FilterGroup>,
    /// Separator waiting for its right-hand operand.
    pending: Option<SeparatorKind>,
    /// The next operand goes into `current_group` rather than `expressions`.
    join_current: bool,
    negate_next: bool,
    seen_operand: bool,
}

impl Ingest {
    fn operand(&mut self, expr: FilterExpression) -> Result<(), QueryError> {
        if self.seen_operand && self.pending.is_none() {
            return Err(QueryError::Parse(
                "filters must be separated by ',', AND or OR".to_string(),
            ));
        }
        let expr = if self.negate_next { negate(expr) } else { expr };

        match self.current_group.as_mut() {
            Some(group) if self.join_current => group.append(expr),
            _ => self.expressions.push(expr),
        }

        self.pending = None;
        self.join_current = false;
        self.negate_next = false;
        self.seen_operand = true;
        Ok(())
    }

    fn separator(&mut self, kind: SeparatorKind) -> Result<(), QueryError> {
        if let Some(prev) = self.pending {
            // only NOT may follow another separator
            if kind != SeparatorKind::Not {
                return Err(QueryError::Parse(format!(
                    "separator '{}' is not followed by a filter",
                    prev.as_str()
                )));
            }
        }

        let operator = match kind {
            SeparatorKind::Comma => {
                self.require_left(kind)?;
                if let Some(group) = self.current_group.take() {
                    self.expressions.push(group.into());
                }
                None
            }
            SeparatorKind::Not => {
                if self.seen_operand && self.pending.is_none() {
                    return Err(QueryError::Parse(
                        "NOT must start the filter list or follow ','".to_string(),
                    ));
                }
                self.negate_next = !self.negate_next;
                None
            }
            SeparatorKind::And | SeparatorKind::AndNot => Some(GroupOperator::And),
            SeparatorKind::Or | SeparatorKind::OrNot => Some(GroupOperator::Or),
        };

        if let Some(operator) = operator {
            self.require_left(kind)?;
            match self.current_group.as_mut() {
                Some(group) => group.set_operator(operator),
                None => {
                    let previous = self.expressions.pop().ok_or_else(|| {
                        QueryError::Parse(format!("separator '{}' has no left operand", kind.as_str()))
                    })?;
                    self.current_group =
                        Some(FilterGroup::from_parts(operator, vec![previous], false));
                }
            }
            self.join_current = true;
            self.negate_next = matches!(kind, SeparatorKind::AndNot | SeparatorKind::OrNot);
        }

        self.pending = Some(kind);
        Ok(())
    }

    fn require_left(&self, kind: SeparatorKind) -> Result<(), QueryError> {
        if self.seen_operand {
            Ok(())
        } else {
            Err(QueryError::Parse(format!(
                "separator '{}' has no left operand",
                kind.as_str()
            )))
        }
    }

    fn finish(mut self) -> Result<Vec<FilterExpression>, QueryError> {
        if let Some(kind) = self.pending {
            return Err(QueryError::Parse(format!(
                "separator '{}' is not followed by a filter",
                kind.as_str()
            )));
        }
        if let Some(group) = self.current_group.take() {
            self.expressions.push(group.into());
        }
        Ok(self.expressions)
    }
}

/// Logical NOT of `expr`. A group that is already negated comes back plain,
/// so `NOT (NOT a:1)` ingests as `a:1`.
fn negate(expr: FilterExpression) -> FilterExpression {
    match expr {
        FilterExpression::Group(mut group) => {
            group.toggle_negation();
            group.into()
        }
        leaf @ FilterExpression::Filter(_) => {
            FilterGroup::from_parts(GroupOperator::And, vec![leaf], true).into()
        }
    }
}

// ---------------------------------------------------------------------------
// Operands
// ---------------------------------------------------------------------------

/// Map one `key <comparator> value` atom.
///
/// A leading `!` flips `:`/`!:` and `IN`/`NOT IN`; a negated regex has no
/// operator of its own and becomes `NOT key:~pattern`.
fn convert_simple(simple: &SimpleFilter) -> Result<FilterExpression, QueryError> {
    if simple.key.is_empty() {
        return Err(QueryError::Parse("filter key is empty".to_string()));
    }
    let key = simple.key.as_str();

    let filter = match (&simple.comparator, &simple.value) {
        (Comparator::Colon | Comparator::NotColon | Comparator::Regex, FilterValue::Single(v)) => {
            if v.is_empty() {
                return Err(QueryError::Parse(format!("filter '{key}' has no value")));
            }
            match (simple.comparator, simple.negative) {
                (Comparator::Colon, false) | (Comparator::NotColon, true) => {
                    Filter::new(key).equal(v.as_str())
                }
                (Comparator::Colon, true) | (Comparator::NotColon, false) => {
                    Filter::new(key).not_equal(v.as_str())
                }
                (_, negative) => {
                    let regex = Filter::new(key).regex(v.as_str());
                    if negative {
                        return Ok(negate(regex.into()));
                    }
                    regex
                }
            }
        }
        (Comparator::In | Comparator::NotIn, FilterValue::List(values)) => {
            if values.is_empty() {
                return Err(QueryError::Parse(format!(
                    "list filter '{key}' has no values"
                )));
            }
            let positive = (simple.comparator == Comparator::In) != simple.negative;
            if positive {
                Filter::new(key).is_in(values.iter().cloned())
            } else {
                Filter::new(key).not_in(values.iter().cloned())
            }
        }
        (comparator, value) => {
            return Err(QueryError::Parse(format!(
                "filter '{key}' pairs {comparator:?} with unsupported value {value:?}"
            )));
        }
    };
    Ok(filter.into())
}

/// Fold a parenthesized sub-list into one group.
///
/// A sub-list that is already a single group is used as is, so `((a OR b))`
/// does not gain an extra level. Anything else becomes an AND group over the
/// sub-list's expressions.
fn convert_grouped(params: &[Param]) -> Result<FilterGroup, QueryError> {
    let inner = ingest_filters(params).map_err(|e| e.context("failed to ingest grouped filter"))?;
    if inner.is_empty() {
        return Err(QueryError::Parse("grouped filter is empty".to_string()));
    }
    Ok(match <[FilterExpression; 1]>::try_from(inner) {
        Ok([FilterExpression::Group(group)]) => group,
        Ok([leaf]) => FilterGroup::from_parts(GroupOperator::And, vec![leaf], false),
        Err(inner) => FilterGroup::from_parts(GroupOperator::And, inner, false),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOperation;
    use crate::render::{render_filter_block, Render};
    use mqb_grammar::Span;

    /// Helper: parse a metric query and ingest it.
    fn ingest(input: &str) -> MetricQuery {
        let expr = mqb_grammar::parse(input).expect("query should parse");
        let ast = expr.as_metric_query().expect("input should be a metric query");
        ingest_metric_query(ast).expect("query should ingest")
    }

    fn block(input: &str) -> String {
        render_filter_block(ingest(input).filter_list()).expect("filters should render")
    }

    fn simple(key: &str, comparator: Comparator, value: FilterValue) -> Param {
        Param::Simple(SimpleFilter {
            negative: false,
            key: key.to_string(),
            comparator,
            value,
            span: Span::new(0, 0),
        })
    }

    fn eq(key: &str, value: &str) -> Param {
        simple(key, Comparator::Colon, FilterValue::Single(value.to_string()))
    }

    #[test]
    fn test_comma_filters_stay_flat() {
        let query = ingest("m{host:web-1, env:prod}");
        assert_eq!(query.filter_list().len(), 2);
        assert!(!query.filter_list().iter().any(FilterExpression::is_group));
        assert_eq!(query.build().unwrap(), "m{host:web-1, env:prod}");
    }

    #[test]
    fn test_wildcard_is_dropped() {
        assert!(ingest("m{*}").filter_list().is_empty());
    }

    #[test]
    fn test_and_run_forms_one_group() {
        let query = ingest("m{a:1 AND b:2 AND c:3}");
        assert_eq!(query.filter_list().len(), 1);
        let group = query.filter_list()[0].as_group().unwrap();
        assert_eq!(group.operator(), GroupOperator::And);
        assert_eq!(group.len(), 3);
    }

    #[test]
    fn test_comma_closes_group() {
        assert_eq!(block("m{a:1 OR b:2, c:3}"), "((a:1 OR b:2) AND c:3)");
        assert_eq!(
            block("m{a:1 AND b:2, c:3 OR d:4}"),
            "((a:1 AND b:2) AND (c:3 OR d:4))"
        );
    }

    #[test]
    fn test_last_operator_wins_within_a_run() {
        assert_eq!(block("m{a:1 OR b:2 AND c:3}"), "(a:1 AND b:2 AND c:3)");
    }

    #[test]
    fn test_parenthesized_groups_nest() {
        assert_eq!(
            block("m{host:web-1 AND (env:prod OR env:staging)}"),
            "(host:web-1 AND (env:prod OR env:staging))"
        );
        // redundant parentheses do not add a level
        assert_eq!(block("m{((env:prod OR env:staging))}"), "(env:prod OR env:staging)");
    }

    #[test]
    fn test_parenthesized_single_filter_is_singleton_group() {
        let query = ingest("m{(host:a)}");
        let group = query.filter_list()[0].as_group().unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(query.build().unwrap(), "m{host:a}");
    }

    #[test]
    fn test_parenthesized_comma_list_becomes_and_group() {
        assert_eq!(block("m{(a:1, b:2) OR c:3}"), "((a:1 AND b:2) OR c:3)");
    }

    #[test]
    fn test_not_variants() {
        assert_eq!(block("m{NOT host:a}"), "NOT host:a");
        assert_eq!(block("m{a:1 AND NOT b:2}"), "(a:1 AND NOT b:2)");
        assert_eq!(block("m{a:1 OR NOT (b:2 OR c:3)}"), "(a:1 OR NOT (b:2 OR c:3))");
        assert_eq!(block("m{a:1, NOT b:2}"), "(a:1 AND NOT b:2)");
        assert_eq!(block("m{a:1 AND NOT NOT b:2}"), "(a:1 AND b:2)");
        assert_eq!(block("m{NOT NOT NOT c:3}"), "NOT c:3");
    }

    #[test]
    fn test_negating_negated_group_cancels() {
        assert_eq!(block("m{NOT (NOT a:1)}"), "a:1");
        assert_eq!(block("m{NOT (NOT (a:1 OR b:2))}"), "(a:1 OR b:2)");
        assert_eq!(block("m{NOT !pod:~web.*}"), "pod:~web.*");
        assert_eq!(block("m{x:1 AND NOT (NOT a:1)}"), "(x:1 AND a:1)");
        assert_eq!(block("m{x:1 OR NOT ((NOT a:1))}"), "(x:1 OR a:1)");
        assert_eq!(block("m{NOT (NOT (NOT a:1))}"), "NOT a:1");
    }

    #[test]
    fn test_comparator_mapping() {
        let query = ingest("m{a:1, b!:2, c:~x.*, d IN (1,2), e NOT IN (3)}");
        let ops: Vec<_> = query
            .filter_list()
            .iter()
            .map(|f| f.as_filter().unwrap().operation().unwrap())
            .collect();
        assert_eq!(
            ops,
            vec![
                FilterOperation::Equal,
                FilterOperation::NotEqual,
                FilterOperation::Regex,
                FilterOperation::In,
                FilterOperation::NotIn,
            ]
        );
    }

    #[test]
    fn test_leading_bang_flips() {
        assert_eq!(block("m{!host:a}"), "host!:a");
        assert_eq!(block("m{!host!:a}"), "host:a");
        assert_eq!(block("m{!host IN (a,b)}"), "host NOT IN (a,b)");
        assert_eq!(block("m{!pod:~web.*}"), "NOT pod:~web.*");
    }

    #[test]
    fn test_values_kept_verbatim() {
        assert_eq!(block(r#"m{service:"web api"}"#), r#"service:"web api""#);
    }

    #[test]
    fn test_empty_list_is_parse_error() {
        let expr = mqb_grammar::parse("m{host IN ()}").unwrap();
        let err = ingest_metric_query(expr.as_metric_query().unwrap()).unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("has no values"));
    }

    #[test]
    fn test_empty_key_is_parse_error() {
        let err = ingest_filters(&[eq("", "x")]).unwrap_err();
        assert_eq!(err, QueryError::Parse("filter key is empty".to_string()));
    }

    #[test]
    fn test_empty_value_is_parse_error() {
        assert!(ingest_filters(&[eq("k", "")]).unwrap_err().is_parse());
    }

    #[test]
    fn test_mismatched_value_shape_is_parse_error() {
        let param = simple("k", Comparator::In, FilterValue::Single("x".into()));
        assert!(ingest_filters(&[param]).unwrap_err().is_parse());
    }

    #[test]
    fn test_separator_without_left_operand() {
        let params = [Param::Separator(SeparatorKind::And), eq("a", "1")];
        assert!(ingest_filters(&params).unwrap_err().is_parse());
        let params = [Param::Separator(SeparatorKind::Comma), eq("a", "1")];
        assert!(ingest_filters(&params).unwrap_err().is_parse());
    }

    #[test]
    fn test_trailing_separator() {
        let params = [eq("a", "1"), Param::Separator(SeparatorKind::Or)];
        let err = ingest_filters(&params).unwrap_err();
        assert!(err.to_string().contains("not followed by a filter"));
    }

    #[test]
    fn test_adjacent_operands_rejected() {
        assert!(ingest_filters(&[eq("a", "1"), eq("b", "2")]).is_err());
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = ingest_filters(&[Param::Grouped(vec![])]).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_full_metric_query() {
        let query = ingest("avg(5m):system.cpu.idle{host:web-1} by {host, env}.rollup(avg, 60).fill(0)");
        assert_eq!(query.aggregator_name(), Some("avg"));
        assert_eq!(query.window(), Some("5m"));
        assert_eq!(query.metric_name(), "system.cpu.idle");
        assert_eq!(query.groups(), ["host", "env"]);
        assert_eq!(query.functions().len(), 2);
        assert_eq!(query.functions()[0].arguments(), ["avg", "60"]);
    }
}
