// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query builder error types.

use mqb_grammar::GrammarError;
use thiserror::Error;

/// Errors raised while building, parsing or ingesting a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A required field is missing, a value count is wrong, or a group is empty.
    #[error("validation error: {0}")]
    Validation(String),

    /// The syntax tree has a shape the model cannot represent.
    #[error("parse error: {0}")]
    Parse(String),

    /// The query string does not match the grammar.
    #[error("parse error: {0}")]
    Syntax(#[from] GrammarError),

    /// A nested failure, annotated with where it happened.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<QueryError>,
    },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Broad category of a [`QueryError`], unaffected by context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Parse,
    Serialization,
}

impl QueryError {
    /// Wrap this error with a description of the enclosing operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        QueryError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The category of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Validation(_) => ErrorKind::Validation,
            QueryError::Parse(_) | QueryError::Syntax(_) => ErrorKind::Parse,
            QueryError::Serialization(_) => ErrorKind::Serialization,
            QueryError::Context { source, .. } => source.kind(),
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_parse(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}
