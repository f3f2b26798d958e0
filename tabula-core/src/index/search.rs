//! Value-lookup index for a single column
//!
//! Maps each distinct non-null value of a column to the row keys carrying it,
//! in ascending key (and therefore row position) order.

use crate::error::{QueryError, QueryResult};
use crate::table::RowKey;
use crate::value::{ColumnType, Value};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Ordered key stored in a search index
#[derive(Debug, Clone)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
}

impl IndexKey {
    /// Convert a cell value into an index key.
    ///
    /// Returns None for null and for values that cannot be indexed. Two
    /// cells share a key exactly when they compare equal with `==`, so
    /// `-0.0` is stored as `0.0` and NaN, which equals nothing, has no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Int(i) => Some(IndexKey::Int(*i)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(IndexKey::Float(*f + 0.0)),
            Value::Double(d) if d.is_nan() => None,
            Value::Double(d) => Some(IndexKey::Double(*d + 0.0)),
            Value::Timestamp(t) => Some(IndexKey::Timestamp(*t)),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            Value::Null | Value::Binary(_) | Value::Table(_) => None,
        }
    }

    /// Convert back into a cell value
    pub fn to_value(&self) -> Value {
        match self {
            IndexKey::Bool(b) => Value::Bool(*b),
            IndexKey::Int(i) => Value::Int(*i),
            IndexKey::Float(f) => Value::Float(*f),
            IndexKey::Double(d) => Value::Double(*d),
            IndexKey::Timestamp(t) => Value::Timestamp(*t),
            IndexKey::String(s) => Value::String(s.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IndexKey::Bool(_) => 0,
            IndexKey::Int(_) => 1,
            IndexKey::Float(_) => 2,
            IndexKey::Double(_) => 3,
            IndexKey::Timestamp(_) => 4,
            IndexKey::String(_) => 5,
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Bool(a), IndexKey::Bool(b)) => a.cmp(b),
            (IndexKey::Int(a), IndexKey::Int(b)) => a.cmp(b),
            (IndexKey::Float(a), IndexKey::Float(b)) => a.total_cmp(b),
            (IndexKey::Double(a), IndexKey::Double(b)) => a.total_cmp(b),
            (IndexKey::Timestamp(a), IndexKey::Timestamp(b)) => a.cmp(b),
            (IndexKey::String(a), IndexKey::String(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

/// Search index over one column
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    /// Indexed column
    column: usize,
    tree: BTreeMap<IndexKey, Vec<RowKey>>,
    total_entries: usize,
}

impl SearchIndex {
    /// Check if a column type can carry a search index
    pub fn supports(column_type: ColumnType) -> bool {
        matches!(
            column_type,
            ColumnType::Int
                | ColumnType::Bool
                | ColumnType::Float
                | ColumnType::Double
                | ColumnType::String
                | ColumnType::Timestamp
        )
    }

    /// Create an empty index, failing for unsupported column types
    pub fn new(column: usize, column_type: ColumnType) -> QueryResult<Self> {
        if !Self::supports(column_type) {
            return Err(QueryError::UnsupportedColumnType {
                operation: "search index",
                column,
                column_type,
            });
        }
        Ok(Self {
            column,
            tree: BTreeMap::new(),
            total_entries: 0,
        })
    }

    /// Indexed column
    pub fn column(&self) -> usize {
        self.column
    }

    /// Insert a row into the index.
    ///
    /// Keys are expected to arrive in ascending order for appended rows; the
    /// insertion keeps each list sorted regardless.
    pub fn insert(&mut self, key: RowKey, value: &Value) {
        let Some(index_key) = IndexKey::from_value(value) else {
            return;
        };
        let rows = self.tree.entry(index_key).or_default();
        match rows.binary_search(&key) {
            Ok(_) => {}
            Err(pos) => {
                rows.insert(pos, key);
                self.total_entries += 1;
            }
        }
    }

    /// Remove a row from the index, returning whether it was present
    pub fn remove(&mut self, key: RowKey, value: &Value) -> bool {
        let Some(index_key) = IndexKey::from_value(value) else {
            return false;
        };
        let Some(rows) = self.tree.get_mut(&index_key) else {
            return false;
        };
        let Ok(pos) = rows.binary_search(&key) else {
            return false;
        };
        rows.remove(pos);
        self.total_entries -= 1;
        if rows.is_empty() {
            self.tree.remove(&index_key);
        }
        true
    }

    /// Find all rows carrying exactly this value
    pub fn find_exact(&self, value: &Value) -> &[RowKey] {
        IndexKey::from_value(value)
            .and_then(|k| self.tree.get(&k))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate over distinct values in ascending order with their rows
    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &[RowKey])> {
        self.tree.iter().map(|(k, rows)| (k, rows.as_slice()))
    }

    /// Number of distinct values
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Number of indexed rows
    pub fn len(&self) -> usize {
        self.total_entries
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Clear all entries from the index
    pub fn clear(&mut self) {
        self.tree.clear();
        self.total_entries = 0;
    }
}
