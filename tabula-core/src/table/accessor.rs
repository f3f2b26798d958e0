//! Read and write interfaces consumed by the query layer

use super::RowKey;
use crate::error::{QueryError, QueryResult};
use crate::index::SearchIndex;
use crate::logging::SlowQueryLogger;
use crate::schema::ColumnSpec;
use crate::value::{ColumnType, Value};

/// Typed read access to a table by column and row position
pub trait ColumnAccessor {
    /// Number of rows
    fn row_count(&self) -> usize;

    /// Number of columns
    fn column_count(&self) -> usize;

    /// Specification of a column
    fn column_spec(&self, column: usize) -> QueryResult<&ColumnSpec>;

    /// Declared type of a column
    fn column_type(&self, column: usize) -> QueryResult<ColumnType> {
        self.column_spec(column).map(|spec| spec.column_type)
    }

    /// Read the value stored at a column and row position
    fn read_value(&self, column: usize, row: usize) -> QueryResult<&Value>;

    /// Stable key of the row at a position
    fn row_key(&self, row: usize) -> QueryResult<RowKey>;

    /// Current position of a row key, or None if the row was removed
    fn position_of(&self, key: RowKey) -> Option<usize>;

    /// Position of a row key, failing if the row was removed
    fn require_position(&self, key: RowKey) -> QueryResult<usize> {
        self.position_of(key).ok_or(QueryError::RowRemoved(key.0))
    }

    /// Search index established on a column, if any
    fn search_index(&self, column: usize) -> Option<&SearchIndex>;

    /// Check if a column has a search index
    fn has_search_index(&self, column: usize) -> bool {
        self.search_index(column).is_some()
    }

    /// Name used in log events
    fn table_name(&self) -> &str {
        ""
    }

    /// Logger receiving slow executor operations
    fn slow_query_logger(&self) -> Option<&SlowQueryLogger> {
        None
    }
}

/// Mutating access used by `remove` and row writes through views
pub trait ColumnMutator: ColumnAccessor {
    /// Remove the row at a position; later rows shift down by one
    fn remove_row(&mut self, row: usize) -> QueryResult<()>;

    /// Replace the value at a column and row position
    fn write_value(&mut self, column: usize, row: usize, value: Value) -> QueryResult<()>;
}
