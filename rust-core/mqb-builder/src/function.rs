// SPDX-License-Identifier: PMPL-1.0-or-later
//! Chained `.name(args)` suffixes such as `.fill(0)` or `.rollup(avg, 60)`.

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::render::Render;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    name: String,
    #[serde(default)]
    args: Vec<String>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument. Arguments are rendered verbatim.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl Render for Function {
    fn build(&self) -> Result<String, QueryError> {
        if self.name.is_empty() {
            return Err(QueryError::Validation("function name is required".to_string()));
        }
        Ok(format!(".{}({})", self.name, self.args.join(", ")))
    }
}
