//! Table schema definition and row validation
//!
//! A schema is an ordered list of column specifications. Columns are
//! addressed by position; names are only used for lookup.

use crate::error::{QueryError, QueryResult};
use crate::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};

/// Specification of a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Declared column type
    pub column_type: ColumnType,
    /// Whether the column accepts null values
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnSpec {
    /// Create a new non-nullable column specification
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    /// Mark the column as nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Whether the column can hold null cells
    pub fn accepts_null(&self) -> bool {
        self.nullable || self.column_type == ColumnType::Any
    }

    /// Check that a value can be stored in this column
    pub fn check_value(&self, index: usize, value: &Value) -> QueryResult<()> {
        match value.column_type() {
            None if self.accepts_null() => Ok(()),
            None => Err(QueryError::type_mismatch(index, self.column_type, "Null")),
            Some(ColumnType::Table) if self.column_type == ColumnType::Any => Err(
                QueryError::type_mismatch(index, self.column_type, value.type_name()),
            ),
            Some(_) if self.column_type == ColumnType::Any => Ok(()),
            Some(found) if found == self.column_type => Ok(()),
            Some(_) => Err(QueryError::type_mismatch(
                index,
                self.column_type,
                value.type_name(),
            )),
        }
    }

    /// Value stored when a row is created without an explicit cell
    pub fn default_value(&self) -> Value {
        if self.accepts_null() {
            return Value::Null;
        }
        match self.column_type {
            ColumnType::Int => Value::Int(0),
            ColumnType::Bool => Value::Bool(false),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Double => Value::Double(0.0),
            ColumnType::String => Value::String(String::new()),
            ColumnType::Binary => Value::Binary(Vec::new()),
            ColumnType::Timestamp => Value::Timestamp(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH),
            ColumnType::Table => Value::Table(Vec::new()),
            ColumnType::Any => Value::Null,
        }
    }
}

/// Ordered set of column specifications for a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Create a schema from column specifications
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All column specifications in order
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Get a column specification by index
    pub fn column(&self, index: usize) -> QueryResult<&ColumnSpec> {
        self.columns.get(index).ok_or(QueryError::ColumnOutOfRange {
            index,
            count: self.columns.len(),
        })
    }

    /// Get a column type by index
    pub fn column_type(&self, index: usize) -> QueryResult<ColumnType> {
        self.column(index).map(|c| c.column_type)
    }

    /// Find a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Find a column by name, failing for unknown names
    pub fn require_column(&self, name: &str) -> QueryResult<usize> {
        self.column_index(name)
            .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
    }

    /// Validate a full row before insertion
    pub fn check_row(&self, values: &[Value]) -> QueryResult<()> {
        if values.len() != self.columns.len() {
            return Err(QueryError::ArityMismatch {
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        for (index, (spec, value)) in self.columns.iter().zip(values).enumerate() {
            spec.check_value(index, value)?;
        }
        Ok(())
    }
}
