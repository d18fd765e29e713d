// SPDX-License-Identifier: PMPL-1.0-or-later
//! mqb grammar
//!
//! Parses metric query strings of the form
//! `[agg[(window)]:]metric{filters}[ by {groups}][.fn(args)...]`,
//! and larger expressions built around them (arithmetic, wrapping functions
//! such as `top(...)` or `moving_rollup(...)`), into a syntax tree.
//!
//! The tree is deliberately close to the source: filter blocks stay a flat
//! list of operands and separator tokens, values keep their quotes, function
//! arguments keep their text, and every metric query remembers where its
//! filter block sits in the input so callers can rewrite it in place.

pub mod ast;
pub mod config;
pub mod error;
pub mod parser;

pub use ast::{
    BinaryOp, Comparator, Expr, FilterValue, FunctionCall, MetricQueryAst, Param, SeparatorKind,
    SimpleFilter, Span,
};
pub use config::{GrammarConfig, DEFAULT_TIME_WINDOW_PATTERN};
pub use error::GrammarError;
pub use parser::{is_key_char, is_value_char, parse, parse_with};
