// SPDX-License-Identifier: PMPL-1.0-or-later
//! Recursive-descent parser for metric queries and the expressions around them.
//!
//! ```text
//! expr     := product (('+' | '-') product)*
//! product  := term (('*' | '/') term)*
//! term     := number | string | '(' expr ')' | metric | call
//! metric   := [agg[(window)]:]name '{' ('*' | params) '}' [by '{' tags '}'] ('.' fn '(' args ')')*
//! call     := ident '(' [expr (',' expr)*] ')'
//! params   := [NOT] operand (sep [NOT] operand)*
//! operand  := filter | '(' params ')'
//! sep      := ',' | AND | OR | AND NOT | OR NOT
//! filter   := ['!'] key (':' value | '!:' value | ':~' value | [NOT] IN '(' values ')')
//! ```

use regex::Regex;
use tracing::debug;

use crate::ast::{
    BinaryOp, Comparator, Expr, FilterValue, FunctionCall, MetricQueryAst, Param, SeparatorKind,
    SimpleFilter, Span,
};
use crate::config::GrammarConfig;
use crate::error::GrammarError;

/// Parse `input` with the default configuration.
pub fn parse(input: &str) -> Result<Expr, GrammarError> {
    parse_with(input, &GrammarConfig::default())
}

/// Parse `input` with explicit limits.
pub fn parse_with(input: &str, config: &GrammarConfig) -> Result<Expr, GrammarError> {
    let time_window = config.compile_time_window()?;
    if input.len() > config.max_query_len {
        debug!(
            len = input.len(),
            max = config.max_query_len,
            "rejecting oversized query"
        );
        return Err(GrammarError::TooLong {
            len: input.len(),
            max: config.max_query_len,
        });
    }

    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
        max_depth: config.max_depth,
        time_window,
    };
    let expr = parser.parse_expr(false)?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    max_depth: usize,
    time_window: Regex,
}

impl<'a> Parser<'a> {
    // -----------------------------------------------------------------------
    // Cursor primitives
    // -----------------------------------------------------------------------

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), GrammarError> {
        if self.eat(ch) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{ch}'")))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    /// Consume `keyword` (ASCII case-insensitive) when it stands alone, i.e.
    /// is followed by whitespace, `(` or `{`.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        let Some(head) = rest.get(..keyword.len()) else {
            return false;
        };
        if !head.eq_ignore_ascii_case(keyword) {
            return false;
        }
        match rest[keyword.len()..].chars().next() {
            Some(c) if c.is_whitespace() || c == '(' || c == '{' => {
                self.pos += keyword.len();
                true
            }
            _ => false,
        }
    }

    fn error(&self, message: impl Into<String>) -> GrammarError {
        let found = match self.peek() {
            Some(c) => format!(", found '{c}'"),
            None => ", found end of input".to_string(),
        };
        GrammarError::syntax(format!("{}{found}", message.into()), self.pos)
    }

    fn enter(&mut self) -> Result<(), GrammarError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(GrammarError::TooDeep(self.max_depth));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn parse_expr(&mut self, in_args: bool) -> Result<Expr, GrammarError> {
        self.enter()?;
        let mut lhs = self.parse_product(in_args)?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_product(in_args)?;
            lhs = binary(op, lhs, rhs);
        }
        self.leave();
        Ok(lhs)
    }

    fn parse_product(&mut self, in_args: bool) -> Result<Expr, GrammarError> {
        let mut lhs = self.parse_term(in_args)?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term(in_args)?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self, in_args: bool) -> Result<Expr, GrammarError> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some('(') => {
                self.bump();
                let inner = self.parse_expr(in_args)?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    span: Span::new(start, self.pos),
                })
            }
            Some('\'' | '"') => {
                let text = self.parse_quoted()?;
                Ok(Expr::Str {
                    text,
                    span: Span::new(start, self.pos),
                })
            }
            Some(c)
                if c.is_ascii_digit()
                    || (c == '-' && matches!(self.peek_nth(1), Some(d) if d.is_ascii_digit())) =>
            {
                self.bump();
                self.take_while(|c| c.is_ascii_digit() || c == '.');
                Ok(Expr::Number {
                    text: self.src[start..self.pos].to_string(),
                    span: Span::new(start, self.pos),
                })
            }
            Some(c) if is_ident_start(c) => self.parse_word_term(in_args),
            _ => Err(self.error("expected a metric query, number or function call")),
        }
    }

    /// A term starting with a word: metric query, function call, or (inside
    /// call arguments) a bare identifier.
    fn parse_word_term(&mut self, in_args: bool) -> Result<Expr, GrammarError> {
        let start = self.pos;
        let word = self.take_while(is_metric_char);
        match self.peek() {
            Some('{') => self.parse_metric_query(start, None, None, word),
            Some(':') => {
                if !is_identifier(word) {
                    return Err(GrammarError::syntax(
                        format!("invalid aggregator '{word}'"),
                        start,
                    ));
                }
                self.bump();
                let metric = self.parse_metric_name()?;
                self.parse_metric_query(start, Some(word), None, metric)
            }
            Some('(') => match self.try_time_window()? {
                Some(window) => {
                    if !is_identifier(word) {
                        return Err(GrammarError::syntax(
                            format!("invalid aggregator '{word}'"),
                            start,
                        ));
                    }
                    let metric = self.parse_metric_name()?;
                    self.parse_metric_query(start, Some(word), Some(window), metric)
                }
                None => self.parse_call(start, word),
            },
            _ if in_args && is_identifier(word) => Ok(Expr::Ident {
                name: word.to_string(),
                span: Span::new(start, self.pos),
            }),
            _ => Err(self.error(format!("expected '{{' after metric name '{word}'"))),
        }
    }

    /// At `(`: consume `(window):` and return the window, or leave the cursor
    /// untouched when this is a function call instead.
    fn try_time_window(&mut self) -> Result<Option<String>, GrammarError> {
        let rest = self.rest();
        let Some(close) = rest.find(')') else {
            return Ok(None);
        };
        let inner = &rest[1..close];
        if inner.contains('(') || !rest[close + 1..].starts_with(':') {
            return Ok(None);
        }
        let window = inner.trim();
        if !self.time_window.is_match(window) {
            return Err(GrammarError::syntax(
                format!("invalid time window '{window}'"),
                self.pos + 1,
            ));
        }
        self.pos += close + 2;
        Ok(Some(window.to_string()))
    }

    fn parse_call(&mut self, start: usize, name: &str) -> Result<Expr, GrammarError> {
        if !is_identifier(name) {
            return Err(GrammarError::syntax(
                format!("invalid function name '{name}'"),
                start,
            ));
        }
        self.expect('(')?;
        self.enter()?;
        let mut args = Vec::new();
        self.skip_ws();
        if !self.eat(')') {
            loop {
                args.push(self.parse_expr(true)?);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                self.expect(')')?;
                break;
            }
        }
        self.leave();
        Ok(Expr::Call {
            name: name.to_string(),
            args,
            span: Span::new(start, self.pos),
        })
    }

    fn parse_quoted(&mut self) -> Result<String, GrammarError> {
        let start = self.pos;
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string literal"));
        };
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
                None => return Err(GrammarError::syntax("unterminated string literal", start)),
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    // -----------------------------------------------------------------------
    // Metric queries
    // -----------------------------------------------------------------------

    fn parse_metric_name(&mut self) -> Result<&'a str, GrammarError> {
        let name = self.take_while(is_metric_char);
        if name.is_empty() {
            return Err(self.error("expected metric name"));
        }
        Ok(name)
    }

    fn parse_metric_query(
        &mut self,
        start: usize,
        aggregator: Option<&str>,
        time_window: Option<String>,
        metric: &str,
    ) -> Result<Expr, GrammarError> {
        self.expect('{')?;
        let filter_start = self.pos;
        self.skip_ws();
        let filters = if self.eat('*') {
            vec![Param::Wildcard]
        } else {
            self.parse_params('}')?
        };
        self.skip_ws();
        let filter_span = Span::new(filter_start, self.pos);
        self.expect('}')?;

        let mut group_by = Vec::new();
        let before_by = self.pos;
        self.skip_ws();
        if self.eat_keyword("by") {
            self.skip_ws();
            self.expect('{')?;
            group_by = self.parse_group_list()?;
        } else {
            self.pos = before_by;
        }

        let mut functions = Vec::new();
        while self.eat('.') {
            let name = self.take_while(is_ident_char);
            if name.is_empty() {
                return Err(self.error("expected function name after '.'"));
            }
            self.expect('(')?;
            let args = self.parse_raw_args()?;
            functions.push(FunctionCall {
                name: name.to_string(),
                args,
            });
        }

        Ok(Expr::Metric(MetricQueryAst {
            aggregator: aggregator.map(str::to_string),
            time_window,
            metric: metric.to_string(),
            filters,
            filter_span,
            group_by,
            functions,
            span: Span::new(start, self.pos),
        }))
    }

    /// Tags inside `by {...}`; consumes the closing brace.
    fn parse_group_list(&mut self) -> Result<Vec<String>, GrammarError> {
        let mut tags = Vec::new();
        loop {
            self.skip_ws();
            let tag = self.take_while(|c| !c.is_whitespace() && c != ',' && c != '}');
            if tag.is_empty() {
                return Err(self.error("expected group-by tag"));
            }
            tags.push(tag.to_string());
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect('}')?;
            return Ok(tags);
        }
    }

    /// Raw, trimmed argument text of a `.fn(...)` suffix; consumes the `)`.
    fn parse_raw_args(&mut self) -> Result<Vec<String>, GrammarError> {
        let open = self.pos - 1;
        let mut args = Vec::new();
        let mut arg_start = self.pos;
        let mut nested = 0usize;
        loop {
            match self.peek() {
                None => return Err(GrammarError::syntax("unclosed function call", open)),
                Some('\'' | '"') => {
                    self.parse_quoted()?;
                }
                Some('(') => {
                    nested += 1;
                    self.bump();
                }
                Some(')') if nested > 0 => {
                    nested -= 1;
                    self.bump();
                }
                Some(')') => {
                    let arg = self.src[arg_start..self.pos].trim();
                    if !arg.is_empty() {
                        args.push(arg.to_string());
                    } else if !args.is_empty() {
                        return Err(self.error("empty function argument"));
                    }
                    self.bump();
                    return Ok(args);
                }
                Some(',') if nested == 0 => {
                    let arg = self.src[arg_start..self.pos].trim();
                    if arg.is_empty() {
                        return Err(self.error("empty function argument"));
                    }
                    args.push(arg.to_string());
                    self.bump();
                    arg_start = self.pos;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Filter blocks
    // -----------------------------------------------------------------------

    /// Operands and separators up to (not including) `close`.
    fn parse_params(&mut self, close: char) -> Result<Vec<Param>, GrammarError> {
        self.enter()?;
        let mut params = Vec::new();
        loop {
            self.skip_ws();
            while self.eat_not_separator() {
                params.push(Param::Separator(SeparatorKind::Not));
                self.skip_ws();
            }
            if self.eat('(') {
                let inner = self.parse_params(')')?;
                self.skip_ws();
                self.expect(')')?;
                params.push(Param::Grouped(inner));
            } else {
                params.push(Param::Simple(self.parse_simple_filter()?));
            }

            self.skip_ws();
            if self.peek() == Some(close) {
                break;
            }
            let separator = if self.eat(',') {
                SeparatorKind::Comma
            } else if self.eat_keyword("AND") {
                self.skip_ws();
                if self.eat_keyword("NOT") {
                    SeparatorKind::AndNot
                } else {
                    SeparatorKind::And
                }
            } else if self.eat_keyword("OR") {
                self.skip_ws();
                if self.eat_keyword("NOT") {
                    SeparatorKind::OrNot
                } else {
                    SeparatorKind::Or
                }
            } else {
                return Err(self.error(format!("expected ',', AND, OR or '{close}'")));
            };
            params.push(Param::Separator(separator));
        }
        self.leave();
        Ok(params)
    }

    /// A `NOT` prefix, unless it is a tag key followed by `IN`.
    fn eat_not_separator(&mut self) -> bool {
        let start = self.pos;
        if !self.eat_keyword("NOT") {
            return false;
        }
        self.skip_ws();
        if self.eat_keyword("IN") {
            self.pos = start;
            return false;
        }
        true
    }

    fn parse_simple_filter(&mut self) -> Result<SimpleFilter, GrammarError> {
        let start = self.pos;
        let negative = self.eat('!');
        let key = self.take_while(is_key_char).to_string();
        if key.is_empty() {
            return Err(self.error("expected filter key"));
        }

        let (comparator, value) = if self.rest().starts_with("!:") {
            self.pos += 2;
            (Comparator::NotColon, FilterValue::Single(self.parse_value()?))
        } else if self.rest().starts_with(":~") {
            self.pos += 2;
            (Comparator::Regex, FilterValue::Single(self.parse_value()?))
        } else if self.eat(':') {
            (Comparator::Colon, FilterValue::Single(self.parse_value()?))
        } else {
            self.skip_ws();
            let comparator = if self.eat_keyword("NOT") {
                self.skip_ws();
                if !self.eat_keyword("IN") {
                    return Err(self.error("expected IN after NOT"));
                }
                Comparator::NotIn
            } else if self.eat_keyword("IN") {
                Comparator::In
            } else {
                return Err(self.error(format!(
                    "expected ':', '!:', ':~', IN or NOT IN after key '{key}'"
                )));
            };
            (comparator, FilterValue::List(self.parse_value_list()?))
        };

        Ok(SimpleFilter {
            negative,
            key,
            comparator,
            value,
            span: Span::new(start, self.pos),
        })
    }

    fn parse_value(&mut self) -> Result<String, GrammarError> {
        if matches!(self.peek(), Some('\'' | '"')) {
            return self.parse_quoted();
        }
        let value = self.take_while(is_value_char);
        if value.is_empty() {
            return Err(self.error("expected filter value"));
        }
        Ok(value.to_string())
    }

    /// `(a, b, c)`; an empty list is syntactically allowed.
    fn parse_value_list(&mut self) -> Result<Vec<String>, GrammarError> {
        self.skip_ws();
        self.expect('(')?;
        let mut values = Vec::new();
        self.skip_ws();
        if self.eat(')') {
            return Ok(values);
        }
        loop {
            self.skip_ws();
            values.push(self.parse_value()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            return Ok(values);
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = Span::new(lhs.span().start, rhs.span().end);
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if is_ident_start(c)) && chars.all(is_ident_char)
}

fn is_metric_char(c: char) -> bool {
    is_ident_char(c) || c == '.'
}

/// Characters allowed in a filter key.
pub fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '@')
}

/// Characters allowed in an unquoted filter value.
pub fn is_value_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ',' | '(' | ')' | '{' | '}')
}
