// SPDX-License-Identifier: PMPL-1.0-or-later
//! Parser configuration.
//!
//! Defaults:
//! - max_query_len: 8192 bytes
//! - max_depth: 64 levels of parentheses, braces and calls
//! - time_window_pattern: `5m`, `1h`, `last_15m` style windows

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GrammarError;

/// Pattern accepted for `agg(window):` time windows unless overridden.
pub const DEFAULT_TIME_WINDOW_PATTERN: &str = r"^([0-9]+[smhdw]|last_[0-9]+[smhdw])$";

/// Limits and patterns applied while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Longest accepted input, in bytes.
    pub max_query_len: usize,
    /// Deepest accepted nesting of groups, sub-expressions and calls.
    pub max_depth: usize,
    /// Regex a time window must match in `agg(window):`.
    pub time_window_pattern: String,
}

impl GrammarConfig {
    /// Check limits and compile the time window pattern.
    pub fn validate(&self) -> Result<(), GrammarError> {
        self.compile_time_window().map(|_| ())
    }

    pub(crate) fn compile_time_window(&self) -> Result<Regex, GrammarError> {
        if self.max_query_len == 0 {
            return Err(GrammarError::InvalidConfig(
                "max_query_len must be greater than zero".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(GrammarError::InvalidConfig(
                "max_depth must be greater than zero".to_string(),
            ));
        }
        Regex::new(&self.time_window_pattern).map_err(|e| {
            GrammarError::InvalidConfig(format!("time_window_pattern: {e}"))
        })
    }
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            max_query_len: 8192,
            max_depth: 64,
            time_window_pattern: DEFAULT_TIME_WINDOW_PATTERN.to_string(),
        }
    }
}
