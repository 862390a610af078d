//! Error types for standardization.
//!
//! This module defines [`FsdError`] which covers the fatal conditions of a
//! standardization run: malformed input schemas, bad configuration, failed
//! persistence and rejected bag concatenations. Missing tags, unresolvable
//! columns and non-computable validations are not errors; they surface as
//! nulls and diagnostic categories in the result.

use thiserror::Error;

/// Errors that can occur while standardizing, persisting or tracking data.
#[derive(Error, Debug)]
pub enum FsdError {
    /// A required column is absent from an input table.
    #[error("Missing required column `{column}` in {table} table")]
    MissingColumn {
        /// Logical name of the table that was checked.
        table: &'static str,
        /// The column that was not found.
        column: &'static str,
    },

    /// A column exists but cannot be read as the expected type.
    #[error("Column `{column}` cannot be read as {expected}: {reason}")]
    ColumnType {
        /// The offending column.
        column: String,
        /// The expected logical type.
        expected: &'static str,
        /// Underlying reason reported by the frame library.
        reason: String,
    },

    /// Two or more bags contain the same report identifiers.
    #[error("Duplicate report identifiers across bags: {}", .0.join(", "))]
    DuplicateReports(Vec<String>),

    /// A rulebook definition is invalid.
    #[error("Invalid rulebook: {0}")]
    Rulebook(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error raised by the data frame library.
    #[error("Frame error: {0}")]
    Frame(#[from] polars::error::PolarsError),

    /// Filesystem error while saving or loading a bag.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error (de)serializing a manifest or rulebook.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error interacting with a progress store.
    #[error("Store error: {0}")]
    Store(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using [`FsdError`].
pub type Result<T> = std::result::Result<T, FsdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FsdError::MissingColumn {
            table: "facts",
            column: "adsh",
        };
        assert_eq!(
            err.to_string(),
            "Missing required column `adsh` in facts table"
        );

        let err = FsdError::DuplicateReports(vec!["a".into(), "b".into()]);
        assert_eq!(
            err.to_string(),
            "Duplicate report identifiers across bags: a, b"
        );
    }
}
