// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for rendering and ingestion

use mqb_builder::prelude::*;
use mqb_builder::FilterOperation;
use proptest::prelude::*;

const KEYS: [&str; 3] = ["ka", "kb", "kc"];
const VALUES: [&str; 3] = ["x", "y", "z"];

/// Generate tag keys; the `k` prefix keeps them clear of AND/OR/NOT/IN
fn arb_key() -> impl Strategy<Value = String> {
    "k[a-z0-9_]{0,8}"
}

/// Generate bare tag values
fn arb_value() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9._-]{0,10}"
}

/// Generate metric names
fn arb_metric() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}"
}

/// Generate single filters of every operation
fn arb_filter() -> impl Strategy<Value = Filter> {
    (
        arb_key(),
        0..5u8,
        prop::collection::vec(arb_value(), 1..4),
    )
        .prop_map(|(key, op, values)| {
            let f = filter(key);
            match op {
                0 => f.equal(values[0].clone()),
                1 => f.not_equal(values[0].clone()),
                2 => f.regex(values[0].clone()),
                3 => f.is_in(values),
                _ => f.not_in(values),
            }
        })
}

/// Generate filter trees up to three levels deep
fn arb_expression() -> impl Strategy<Value = FilterExpression> {
    let leaf = arb_filter().prop_map(FilterExpression::from);
    leaf.prop_recursive(3, 24, 4, |inner| {
        (prop::collection::vec(inner, 1..4), any::<bool>(), any::<bool>()).prop_map(
            |(children, use_or, negated)| {
                let mut g = group();
                for child in children {
                    g = if use_or { g.or(child) } else { g.and(child) };
                }
                if negated {
                    g = g.not();
                }
                g.into()
            },
        )
    })
}

/// A hand-written filter block: atoms with an optional `!`, and parenthesized
/// levels whose operands may carry any number of `NOT`s.
#[derive(Debug, Clone)]
enum Source {
    Atom {
        bang: bool,
        key: &'static str,
        op: u8,
        values: Vec<&'static str>,
    },
    Level {
        or: bool,
        /// `(number of NOTs, operand)`
        items: Vec<(usize, Source)>,
        /// Per gap in an AND level: `,` instead of `AND`.
        commas: Vec<bool>,
        double_parens: bool,
    },
}

impl Source {
    fn text(&self) -> String {
        match self {
            Source::Atom { bang, key, op, values } => {
                let bang = if *bang { "!" } else { "" };
                match *op {
                    0 => format!("{bang}{key}:{}", values[0]),
                    1 => format!("{bang}{key}!:{}", values[0]),
                    2 => format!("{bang}{key}:~{}", values[0]),
                    3 => format!("{bang}{key} IN ({})", values.join(",")),
                    _ => format!("{bang}{key} NOT IN ({})", values.join(",")),
                }
            }
            Source::Level { double_parens, .. } => {
                let inner = format!("({})", self.block());
                if *double_parens {
                    format!("({inner})")
                } else {
                    inner
                }
            }
        }
    }

    /// Contents of a level without its parentheses.
    fn block(&self) -> String {
        let Source::Level { or, items, commas, .. } = self else {
            return self.text();
        };
        let mut out = String::new();
        for (i, (nots, item)) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(match (*or, commas[i - 1]) {
                    (true, _) => " OR ",
                    (false, true) => ", ",
                    (false, false) => " AND ",
                });
            }
            out.push_str(&"NOT ".repeat(*nots));
            out.push_str(&item.text());
        }
        out
    }

    fn eval(&self, tags: &[&str; 3]) -> bool {
        match self {
            Source::Atom { bang, key, op, values } => {
                let actual = tag(tags, key);
                let listed = values.iter().any(|v| *v == actual);
                let matched = match *op {
                    0 | 2 => actual == values[0],
                    1 => actual != values[0],
                    3 => listed,
                    _ => !listed,
                };
                matched != *bang
            }
            Source::Level { or, items, .. } => {
                let mut results = items.iter().map(|(nots, item)| item.eval(tags) != (nots % 2 == 1));
                if *or {
                    results.any(|r| r)
                } else {
                    results.all(|r| r)
                }
            }
        }
    }
}

fn tag<'a>(tags: &[&'a str; 3], key: &str) -> &'a str {
    let index = KEYS.iter().position(|k| *k == key).unwrap();
    tags[index]
}

/// Evaluate an ingested tree; regex patterns are matched literally.
fn eval_expression(expr: &FilterExpression, tags: &[&str; 3]) -> bool {
    match expr {
        FilterExpression::Filter(f) => {
            let actual = tag(tags, f.key());
            let contains = f.values().iter().any(|v| v == actual);
            match f.operation().unwrap() {
                FilterOperation::Equal | FilterOperation::Regex => f.values()[0] == actual,
                FilterOperation::NotEqual => f.values()[0] != actual,
                FilterOperation::In => contains,
                FilterOperation::NotIn => !contains,
            }
        }
        FilterExpression::Group(g) => {
            let mut results = g.children().iter().map(|c| eval_expression(c, tags));
            let matched = match g.operator() {
                GroupOperator::Or => results.any(|r| r),
                GroupOperator::And => results.all(|r| r),
            };
            matched != g.is_negated()
        }
    }
}

fn eval_block(filters: &[FilterExpression], tags: &[&str; 3]) -> bool {
    filters.iter().all(|f| eval_expression(f, tags))
}

fn arb_source_atom() -> impl Strategy<Value = Source> {
    (
        any::<bool>(),
        prop::sample::select(KEYS.to_vec()),
        0..5u8,
        prop::collection::vec(prop::sample::select(VALUES.to_vec()), 1..3),
    )
        .prop_map(|(bang, key, op, values)| Source::Atom { bang, key, op, values })
}

fn arb_level(inner: impl Strategy<Value = Source>, double_parens: bool) -> impl Strategy<Value = Source> {
    (
        any::<bool>(),
        prop::collection::vec((0..4usize, inner), 1..4),
        prop::collection::vec(any::<bool>(), 3),
        Just(double_parens),
    )
        .prop_map(|(or, items, commas, double_parens)| Source::Level {
            or,
            items,
            commas,
            double_parens,
        })
}

/// Generate a whole filter block as source text plus its meaning
fn arb_source_block() -> impl Strategy<Value = Source> {
    let operand = arb_source_atom().prop_recursive(3, 24, 3, |inner| {
        any::<bool>().prop_flat_map(move |double| arb_level(inner.clone(), double))
    });
    arb_level(operand, false)
}

proptest! {
    #[test]
    fn test_ingestion_preserves_meaning(
        source in arb_source_block(),
        tags in prop::array::uniform3(prop::sample::select(VALUES.to_vec()))
    ) {
        let text = format!("m{{{}}}", source.block());
        let query = parse_query(&text).unwrap().into_metric().unwrap();
        let expected = source.eval(&tags);
        prop_assert_eq!(eval_block(query.filter_list(), &tags), expected, "ingesting {}", text);

        let rendered = query.build().unwrap();
        let reparsed = parse_query(&rendered).unwrap().into_metric().unwrap();
        prop_assert_eq!(eval_block(reparsed.filter_list(), &tags), expected, "re-parsing {}", rendered);
    }

    #[test]
    fn test_comma_filters_roundtrip_exactly(
        name in arb_metric(),
        filters in prop::collection::vec(arb_filter(), 0..6)
    ) {
        let query = metric(name).filters(filters);
        let rendered = query.build().unwrap();
        let reparsed = parse_query(&rendered).unwrap().build().unwrap();
        prop_assert_eq!(reparsed, rendered);
    }

    #[test]
    fn test_render_ingest_is_idempotent(
        name in arb_metric(),
        filters in prop::collection::vec(arb_expression(), 0..4)
    ) {
        let query = metric(name).filters(filters);
        let once = parse_query(&query.build().unwrap()).unwrap().build().unwrap();
        let twice = parse_query(&once).unwrap().build().unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn test_empty_filters_render_wildcard(name in arb_metric()) {
        prop_assert_eq!(metric(name.clone()).build().unwrap(), format!("{name}{{*}}"));
    }

    #[test]
    fn test_not_is_idempotent(children in prop::collection::vec(arb_filter(), 1..5)) {
        let mut g = group();
        for child in children {
            g = g.or(child);
        }
        let once = g.clone().not();
        let twice = g.not().not();
        prop_assert_eq!(once.build().unwrap(), twice.build().unwrap());
    }

    #[test]
    fn test_group_parenthesized_only_when_plural(children in prop::collection::vec(arb_filter(), 1..5)) {
        let count = children.len();
        let mut g = group();
        for child in children {
            g = g.and(child);
        }
        let rendered = g.build().unwrap();
        prop_assert_eq!(rendered.starts_with('('), count > 1);
    }

    #[test]
    fn test_grammar_never_panics(input in "\\PC{0,64}") {
        let _ = parse_query(&input);
    }
}
