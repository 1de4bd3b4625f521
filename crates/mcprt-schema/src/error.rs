//! Validation diagnostics.

use std::fmt;

/// A single validation failure, qualified by a JSON-path-ish pointer into
/// the value being checked (e.g. `$.arguments.count`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// One or more validation failures collected from a single validation pass.
/// Validation never stops at the first error: a caller reporting this back
/// to a user wants the whole list, not one error at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

impl SchemaErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
