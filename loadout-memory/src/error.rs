//! Error types for the in-memory backend.

use loadout_query::error::{IntoQueryError, QueryError};
use thiserror::Error;

/// Result type for in-memory backend operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Error type for in-memory backend operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// No table of that name was created.
    #[error("no such table: {0}")]
    UnknownTable(String),

    /// A projected column exists in no row of the table.
    #[error("no such column: {table}.{column}")]
    UnknownColumn { table: String, column: String },

    /// A query expression was projected without a registered evaluator.
    #[error("no evaluator registered for expression `{0}`")]
    UnknownExpression(String),

    /// Inserted data was not a row.
    #[error("invalid row for table {table}: {message}")]
    InvalidRow { table: String, message: String },

    /// Failure injected with [`MemoryBackend::fail_next`](crate::MemoryBackend::fail_next).
    #[error("{0}")]
    Injected(String),
}

impl From<MemoryError> for QueryError {
    fn from(err: MemoryError) -> Self {
        err.into_query_error()
    }
}
