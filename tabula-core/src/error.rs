//! Error types for the query and view layer
//!
//! Every failure is reported synchronously to the caller of the operation
//! that triggered it. Variants are grouped into four kinds (see [`ErrorKind`]).

use crate::value::ColumnType;
use std::fmt;

/// Broad classification of a [`QueryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Detected while building a predicate tree
    Build,
    /// Column, row or window bounds violated
    Range,
    /// The requested operation is not available for the column or data
    Capability,
    /// The table, view or row is no longer usable
    Validity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Build => "build",
            ErrorKind::Range => "range",
            ErrorKind::Capability => "capability",
            ErrorKind::Validity => "validity",
        };
        f.write_str(name)
    }
}

/// Errors raised by tables, predicate builders, executors and views
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Type mismatch on column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: usize,
        expected: ColumnType,
        found: String,
    },

    #[error("Unbalanced group: {0}")]
    UnbalancedGroup(String),

    #[error("Dangling combinator: {0}")]
    DanglingCombinator(String),

    #[error("Operator {operator} is not supported on {column_type} column {column}")]
    UnsupportedOperator {
        operator: &'static str,
        column: usize,
        column_type: ColumnType,
    },

    #[error("Column index {index} out of range (column count {count})")]
    ColumnOutOfRange { index: usize, count: usize },

    #[error("Unknown column name: {0}")]
    UnknownColumn(String),

    #[error("Row index {index} out of range (row count {count})")]
    RowOutOfRange { index: usize, count: usize },

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Row arity mismatch: expected {expected} values, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Column {column} of type {column_type} cannot be sorted")]
    UnsupportedSortType { column: usize, column_type: ColumnType },

    #[error("Column {column} of type {column_type} does not support {operation}")]
    UnsupportedColumnType {
        operation: &'static str,
        column: usize,
        column_type: ColumnType,
    },

    #[error("Column {0} has no search index")]
    MissingIndex(usize),

    #[error("Aggregate {0} over an empty match set")]
    EmptyAggregate(&'static str),

    #[error("Aggregate {0} overflowed")]
    AggregateOverflow(&'static str),

    #[error("Table is no longer valid")]
    TableInvalid,

    #[error("Row {0} no longer exists")]
    RowRemoved(u64),
}

impl QueryError {
    /// Returns the kind of failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::TypeMismatch { .. }
            | QueryError::UnbalancedGroup(_)
            | QueryError::DanglingCombinator(_)
            | QueryError::UnsupportedOperator { .. } => ErrorKind::Build,

            QueryError::ColumnOutOfRange { .. }
            | QueryError::UnknownColumn(_)
            | QueryError::RowOutOfRange { .. }
            | QueryError::InvalidWindow(_)
            | QueryError::ArityMismatch { .. }
            | QueryError::AggregateOverflow(_) => ErrorKind::Range,

            QueryError::UnsupportedSortType { .. }
            | QueryError::UnsupportedColumnType { .. }
            | QueryError::MissingIndex(_)
            | QueryError::EmptyAggregate(_) => ErrorKind::Capability,

            QueryError::TableInvalid | QueryError::RowRemoved(_) => ErrorKind::Validity,
        }
    }

    pub(crate) fn type_mismatch(column: usize, expected: ColumnType, found: impl Into<String>) -> Self {
        QueryError::TypeMismatch {
            column,
            expected,
            found: found.into(),
        }
    }
}

/// Result type for query and view operations
pub type QueryResult<T> = Result<T, QueryError>;
