// SPDX-License-Identifier: PMPL-1.0-or-later
//! Syntax tree produced by the parser.
//!
//! Filter blocks are kept as a flat, ordered list of [`Param`]s exactly as they
//! appear in the source (operands interleaved with separator tokens). Grouping
//! by boolean operator is left to consumers; only parenthesized sub-lists are
//! nested, as [`Param::Grouped`].

/// Half-open byte range `[start, end)` into the parsed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Slice `source` with this span; `None` if the span does not fit it.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }
}

/// Boolean separator between filter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeparatorKind {
    /// `,` (implicit AND).
    Comma,
    And,
    Or,
    /// A bare `NOT`, leading or after a comma.
    Not,
    AndNot,
    OrNot,
}

impl SeparatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SeparatorKind::Comma => ",",
            SeparatorKind::And => "AND",
            SeparatorKind::Or => "OR",
            SeparatorKind::Not => "NOT",
            SeparatorKind::AndNot => "AND NOT",
            SeparatorKind::OrNot => "OR NOT",
        }
    }
}

/// Comparison between a filter key and its value(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `key:value`
    Colon,
    /// `key!:value`
    NotColon,
    /// `key:~pattern`
    Regex,
    /// `key IN (a,b)`
    In,
    /// `key NOT IN (a,b)`
    NotIn,
}

/// Right-hand side of a simple filter. Quoted values keep their quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

/// A `key <comparator> value` atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleFilter {
    /// Leading `!` as in `!host:web-1`.
    pub negative: bool,
    pub key: String,
    pub comparator: Comparator,
    pub value: FilterValue,
    pub span: Span,
}

/// One entry of a filter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// `*`
    Wildcard,
    Simple(SimpleFilter),
    /// Parenthesized sub-list.
    Grouped(Vec<Param>),
    Separator(SeparatorKind),
}

/// A `.name(args)` suffix. Arguments are the trimmed source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<String>,
}

/// `[agg[(window)]:]metric{filters}[ by {groups}][.fn(args)...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQueryAst {
    pub aggregator: Option<String>,
    pub time_window: Option<String>,
    pub metric: String,
    pub filters: Vec<Param>,
    /// Contents of the `{...}` filter block, braces excluded.
    pub filter_span: Span,
    pub group_by: Vec<String>,
    pub functions: Vec<FunctionCall>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn as_char(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

/// A complete query: a bare metric query or a larger expression around one or
/// more metric queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Metric(MetricQueryAst),
    Number {
        text: String,
        span: Span,
    },
    /// Quoted string literal, quotes included.
    Str {
        text: String,
        span: Span,
    },
    /// Bare word, only valid as a function argument (`rollup(avg, 60)`).
    Ident {
        name: String,
        span: Span,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Paren {
        inner: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Metric(mq) => mq.span,
            Expr::Number { span, .. }
            | Expr::Str { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Call { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Paren { span, .. } => *span,
        }
    }

    /// The metric query, if this expression is nothing but one.
    pub fn as_metric_query(&self) -> Option<&MetricQueryAst> {
        match self {
            Expr::Metric(mq) => Some(mq),
            _ => None,
        }
    }

    /// Every embedded metric query, in source order.
    pub fn metric_queries(&self) -> Vec<&MetricQueryAst> {
        let mut out = Vec::new();
        self.collect_metric_queries(&mut out);
        out
    }

    fn collect_metric_queries<'a>(&'a self, out: &mut Vec<&'a MetricQueryAst>) {
        match self {
            Expr::Metric(mq) => out.push(mq),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_metric_queries(out);
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_metric_queries(out);
                rhs.collect_metric_queries(out);
            }
            Expr::Paren { inner, .. } => inner.collect_metric_queries(out),
            Expr::Number { .. } | Expr::Str { .. } | Expr::Ident { .. } => {}
        }
    }
}
