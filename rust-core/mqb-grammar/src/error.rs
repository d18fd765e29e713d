// SPDX-License-Identifier: PMPL-1.0-or-later
//! Grammar error types.

use thiserror::Error;

/// Errors produced while parsing a query string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The input does not match the query grammar.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// What was expected or found.
        message: String,
        /// Byte offset into the input where parsing stopped.
        offset: usize,
    },

    /// The input exceeds the configured length limit.
    #[error("query too long: {len} bytes (max: {max})")]
    TooLong {
        /// Actual input length in bytes.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Parentheses, braces or function calls nest deeper than allowed.
    #[error("query nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GrammarError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize) -> Self {
        GrammarError::Syntax {
            message: message.into(),
            offset,
        }
    }

    /// Byte offset of a syntax error, if this is one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            GrammarError::Syntax { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
