//! In-memory column-major table
//!
//! `Table` is a shared handle: clones refer to the same rows. Views hold a
//! weak reference so that a closed or dropped table invalidates them.

use super::{ColumnAccessor, ColumnMutator, RowKey};
use crate::config::EngineSettings;
use crate::error::{QueryError, QueryResult};
use crate::index::SearchIndex;
use crate::logging::{SlowQuery, SlowQueryLogger};
use crate::query::{PredicateTree, Query, ResultWindow};
use crate::schema::{ColumnSpec, TableSchema};
use crate::value::{ColumnType, Value};
use crate::view::{distinct_keys, Origin, View};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Row data and indexes behind a [`Table`] handle
#[derive(Debug)]
pub(crate) struct TableInner {
    name: String,
    schema: TableSchema,
    /// One vector per column, all of equal length
    columns: Vec<Vec<Value>>,
    /// Key of each row, ascending
    keys: Vec<RowKey>,
    next_key: u64,
    /// Bumped on every structural mutation
    version: u64,
    valid: bool,
    indexes: HashMap<usize, SearchIndex>,
    slow_log: SlowQueryLogger,
}

impl TableInner {
    fn new(name: String, schema: TableSchema, settings: &EngineSettings) -> Self {
        let columns = vec![Vec::new(); schema.len()];
        Self {
            name,
            schema,
            columns,
            keys: Vec::new(),
            next_key: 0,
            version: 0,
            valid: true,
            indexes: HashMap::new(),
            slow_log: SlowQueryLogger::from_settings(settings),
        }
    }

    pub(crate) fn ensure_valid(&self) -> QueryResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(QueryError::TableInvalid)
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    fn check_row_index(&self, row: usize) -> QueryResult<()> {
        if row < self.keys.len() {
            Ok(())
        } else {
            Err(QueryError::RowOutOfRange {
                index: row,
                count: self.keys.len(),
            })
        }
    }

    fn insert_row(&mut self, values: Vec<Value>) -> QueryResult<RowKey> {
        self.schema.check_row(&values)?;

        let key = RowKey(self.next_key);
        self.next_key += 1;

        for (column, value) in values.into_iter().enumerate() {
            if let Some(index) = self.indexes.get_mut(&column) {
                index.insert(key, &value);
            }
            self.columns[column].push(value);
        }
        self.keys.push(key);
        self.version += 1;

        Ok(key)
    }

    fn clear_rows(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        for index in self.indexes.values_mut() {
            index.clear();
        }
        self.keys.clear();
        self.version += 1;
    }

    fn create_index(&mut self, column: usize) -> QueryResult<bool> {
        let column_type = self.schema.column_type(column)?;
        if self.indexes.contains_key(&column) {
            return Ok(false);
        }

        let mut index = SearchIndex::new(column, column_type)?;
        for (key, value) in self.keys.iter().zip(&self.columns[column]) {
            index.insert(*key, value);
        }
        self.indexes.insert(column, index);

        Ok(true)
    }

    fn find_first_value(&self, column: usize, value: &Value) -> QueryResult<Option<usize>> {
        self.schema.column(column)?.check_value(column, value)?;

        if !value.is_null() {
            if let Some(index) = self.indexes.get(&column) {
                return Ok(index
                    .find_exact(value)
                    .first()
                    .and_then(|key| self.position_of(*key)));
            }
        }

        Ok(self.columns[column].iter().position(|cell| cell == value))
    }

    fn find_value_keys(&self, column: usize, value: &Value) -> QueryResult<Vec<RowKey>> {
        self.schema.column(column)?.check_value(column, value)?;

        if !value.is_null() {
            if let Some(index) = self.indexes.get(&column) {
                return Ok(index.find_exact(value).to_vec());
            }
        }

        Ok(self
            .keys
            .iter()
            .zip(&self.columns[column])
            .filter(|(_, cell)| *cell == value)
            .map(|(key, _)| *key)
            .collect())
    }
}

impl ColumnAccessor for TableInner {
    fn row_count(&self) -> usize {
        self.keys.len()
    }

    fn column_count(&self) -> usize {
        self.schema.len()
    }

    fn column_spec(&self, column: usize) -> QueryResult<&ColumnSpec> {
        self.schema.column(column)
    }

    fn read_value(&self, column: usize, row: usize) -> QueryResult<&Value> {
        let cells = self.columns.get(column).ok_or(QueryError::ColumnOutOfRange {
            index: column,
            count: self.columns.len(),
        })?;
        cells.get(row).ok_or(QueryError::RowOutOfRange {
            index: row,
            count: cells.len(),
        })
    }

    fn row_key(&self, row: usize) -> QueryResult<RowKey> {
        self.keys.get(row).copied().ok_or(QueryError::RowOutOfRange {
            index: row,
            count: self.keys.len(),
        })
    }

    fn position_of(&self, key: RowKey) -> Option<usize> {
        self.keys.binary_search(&key).ok()
    }

    fn search_index(&self, column: usize) -> Option<&SearchIndex> {
        self.indexes.get(&column)
    }

    fn table_name(&self) -> &str {
        &self.name
    }

    fn slow_query_logger(&self) -> Option<&SlowQueryLogger> {
        Some(&self.slow_log)
    }
}

impl ColumnMutator for TableInner {
    fn remove_row(&mut self, row: usize) -> QueryResult<()> {
        self.check_row_index(row)?;

        let key = self.keys.remove(row);
        for (column, cells) in self.columns.iter_mut().enumerate() {
            let value = cells.remove(row);
            if let Some(index) = self.indexes.get_mut(&column) {
                index.remove(key, &value);
            }
        }
        self.version += 1;

        Ok(())
    }

    fn write_value(&mut self, column: usize, row: usize, value: Value) -> QueryResult<()> {
        self.schema.column(column)?.check_value(column, &value)?;
        self.check_row_index(row)?;

        let key = self.keys[row];
        let old = std::mem::replace(&mut self.columns[column][row], value);
        if let Some(index) = self.indexes.get_mut(&column) {
            index.remove(key, &old);
            index.insert(key, &self.columns[column][row]);
        }

        Ok(())
    }
}

/// Shared handle to an in-memory table
#[derive(Debug, Clone)]
pub struct Table {
    inner: Arc<RwLock<TableInner>>,
}

impl Table {
    /// Create an empty table with default engine settings
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self::with_config(name, columns, &EngineSettings::default())
    }

    /// Create an empty table with explicit engine settings
    pub fn with_config(
        name: impl Into<String>,
        columns: Vec<ColumnSpec>,
        settings: &EngineSettings,
    ) -> Self {
        let name = name.into();
        debug!("Creating table {} with {} columns", name, columns.len());
        Self {
            inner: Arc::new(RwLock::new(TableInner::new(
                name,
                TableSchema::new(columns),
                settings,
            ))),
        }
    }

    pub(crate) fn from_shared(inner: Arc<RwLock<TableInner>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RwLock<TableInner>> {
        Arc::downgrade(&self.inner)
    }

    /// Acquire a read lock on a valid table
    pub(crate) fn read(&self) -> QueryResult<RwLockReadGuard<'_, TableInner>> {
        let guard = self.inner.read();
        guard.ensure_valid()?;
        Ok(guard)
    }

    /// Acquire a write lock on a valid table
    pub(crate) fn write(&self) -> QueryResult<RwLockWriteGuard<'_, TableInner>> {
        let guard = self.inner.write();
        guard.ensure_valid()?;
        Ok(guard)
    }

    /// Table name
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// Snapshot of the table schema
    pub fn schema(&self) -> QueryResult<TableSchema> {
        Ok(self.read()?.schema.clone())
    }

    /// Number of rows
    pub fn size(&self) -> QueryResult<usize> {
        Ok(self.read()?.row_count())
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> QueryResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Find a column by name
    pub fn column_index(&self, name: &str) -> QueryResult<Option<usize>> {
        Ok(self.read()?.schema.column_index(name))
    }

    /// Declared type of a column
    pub fn column_type(&self, column: usize) -> QueryResult<ColumnType> {
        self.read()?.column_type(column)
    }

    /// Append a row, returning its stable key
    pub fn add_row(&self, values: Vec<Value>) -> QueryResult<RowKey> {
        self.write()?.insert_row(values)
    }

    /// Append a row holding the default value of every column
    pub fn add_empty_row(&self) -> QueryResult<RowKey> {
        let mut inner = self.write()?;
        let values = inner
            .schema
            .columns()
            .iter()
            .map(ColumnSpec::default_value)
            .collect();
        inner.insert_row(values)
    }

    /// Read the value at a column and row position
    pub fn get(&self, column: usize, row: usize) -> QueryResult<Value> {
        self.read()?.read_value(column, row).cloned()
    }

    /// Replace the value at a column and row position
    pub fn set(&self, column: usize, row: usize, value: impl Into<Value>) -> QueryResult<()> {
        self.write()?.write_value(column, row, value.into())
    }

    /// Stable key of the row at a position
    pub fn row_key(&self, row: usize) -> QueryResult<RowKey> {
        self.read()?.row_key(row)
    }

    /// Current position of a row key, or None if the row was removed
    pub fn position_of(&self, key: RowKey) -> QueryResult<Option<usize>> {
        Ok(self.read()?.position_of(key))
    }

    /// Remove the row at a position
    pub fn remove(&self, row: usize) -> QueryResult<()> {
        self.write()?.remove_row(row)
    }

    /// Remove the last row
    pub fn remove_last(&self) -> QueryResult<()> {
        let mut inner = self.write()?;
        match inner.row_count() {
            0 => Err(QueryError::RowOutOfRange { index: 0, count: 0 }),
            count => inner.remove_row(count - 1),
        }
    }

    /// Remove every row
    pub fn clear(&self) -> QueryResult<()> {
        self.write()?.clear_rows();
        Ok(())
    }

    /// Establish a search index on a column. Adding it twice is a no-op.
    pub fn add_search_index(&self, column: usize) -> QueryResult<()> {
        let mut inner = self.write()?;
        if inner.create_index(column)? {
            info!("Created search index on {}.{}", inner.name, column);
        }
        Ok(())
    }

    /// Check if a column has a search index
    pub fn has_search_index(&self, column: usize) -> QueryResult<bool> {
        let inner = self.read()?;
        inner.schema.column(column)?;
        Ok(inner.has_search_index(column))
    }

    /// Position of the first row holding exactly `value` in a column
    pub fn find_first_value(
        &self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<Option<usize>> {
        self.read()?.find_first_value(column, &value.into())
    }

    /// View of every row holding exactly `value` in a column, in position
    /// order
    pub fn find_all_value(&self, column: usize, value: impl Into<Value>) -> QueryResult<View> {
        let value = value.into();
        let inner = self.read()?;
        let keys = inner.find_value_keys(column, &value)?;
        let origin = Origin::Query {
            tree: PredicateTree::value_lookup(column, value),
            base: None,
            window: ResultWindow::all(),
        };
        Ok(View::new(self, keys, inner.version(), origin))
    }

    /// View of the first row for each distinct value of an indexed column
    pub fn distinct(&self, column: usize) -> QueryResult<View> {
        let inner = self.read()?;
        let keys = distinct_keys(&*inner, column, None)?;
        Ok(View::new(self, keys, inner.version(), Origin::Table).with_distinct(column))
    }

    /// View over every row in position order
    pub fn view(&self) -> QueryResult<View> {
        let inner = self.read()?;
        Ok(View::new(
            self,
            inner.keys.clone(),
            inner.version(),
            Origin::Table,
        ))
    }

    /// Start a query over the whole table
    pub fn query(&self) -> QueryResult<Query> {
        Query::new(self.clone())
    }

    /// Invalidate the table. Every later operation on it, its queries and
    /// its views fails.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        if inner.valid {
            info!("Closing table {}", inner.name);
        }
        inner.valid = false;
    }

    /// Check if the table is still usable
    pub fn is_valid(&self) -> bool {
        self.inner.read().valid
    }

    /// Structural version, bumped on insert, remove and clear
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Recently recorded slow operations
    pub fn slow_queries(&self, limit: Option<usize>) -> Vec<SlowQuery> {
        self.inner.read().slow_log.get_slow_queries(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores_table() -> Table {
        let table = Table::new(
            "scores",
            vec![
                ColumnSpec::new("name", ColumnType::String),
                ColumnSpec::new("score", ColumnType::Int),
                ColumnSpec::new("note", ColumnType::String).nullable(),
            ],
        );
        for (name, score) in [("user1", 420i64), ("user2", 770), ("user3", 327), ("user4", 770)] {
            table
                .add_row(vec![name.into(), score.into(), Value::Null])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_add_and_get() {
        let table = scores_table();
        assert_eq!(table.size().unwrap(), 4);
        assert_eq!(table.get(0, 1).unwrap(), Value::from("user2"));
        assert_eq!(table.get(1, 3).unwrap(), Value::Int(770));
        assert!(matches!(
            table.get(1, 4),
            Err(QueryError::RowOutOfRange { index: 4, count: 4 })
        ));
        assert!(matches!(
            table.get(3, 0),
            Err(QueryError::ColumnOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_rejects_bad_rows() {
        let table = scores_table();
        let version = table.version();
        assert!(matches!(
            table.add_row(vec!["x".into(), "1".into(), Value::Null]),
            Err(QueryError::TypeMismatch { column: 1, .. })
        ));
        assert!(matches!(
            table.set(1, 0, 1.5f64),
            Err(QueryError::TypeMismatch { column: 1, .. })
        ));
        assert_eq!(table.version(), version);
        assert_eq!(table.size().unwrap(), 4);
    }

    #[test]
    fn test_remove_keeps_keys_stable() {
        let table = scores_table();
        let key = table.row_key(2).unwrap();
        let removed = table.row_key(1).unwrap();

        table.remove(1).unwrap();
        assert_eq!(table.size().unwrap(), 3);
        assert_eq!(table.position_of(key).unwrap(), Some(1));
        assert_eq!(table.position_of(removed).unwrap(), None);
        assert_eq!(table.get(0, 1).unwrap(), Value::from("user3"));

        table.remove_last().unwrap();
        assert_eq!(table.size().unwrap(), 2);
        table.clear().unwrap();
        assert!(matches!(
            table.remove_last(),
            Err(QueryError::RowOutOfRange { .. })
        ));
    }

    #[test]
    fn test_version_tracks_structure_only() {
        let table = scores_table();
        let version = table.version();
        table.set(1, 0, 999i64).unwrap();
        assert_eq!(table.version(), version);
        table.add_empty_row().unwrap();
        assert_eq!(table.version(), version + 1);
        assert_eq!(table.get(1, 4).unwrap(), Value::Int(0));
        assert_eq!(table.get(2, 4).unwrap(), Value::Null);
    }

    #[test]
    fn test_search_index_maintenance() {
        let table = scores_table();
        table.add_search_index(1).unwrap();
        table.add_search_index(1).unwrap();
        assert!(table.has_search_index(1).unwrap());
        assert!(!table.has_search_index(0).unwrap());

        assert_eq!(table.find_first_value(1, 770i64).unwrap(), Some(1));
        table.set(1, 1, 100i64).unwrap();
        assert_eq!(table.find_first_value(1, 770i64).unwrap(), Some(3));
        table.remove(0).unwrap();
        assert_eq!(table.find_first_value(1, 770i64).unwrap(), Some(2));
        assert_eq!(table.find_first_value(1, 1i64).unwrap(), None);

        let inner = table.read().unwrap();
        let index = inner.search_index(1).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_find_first_value_without_index() {
        let table = scores_table();
        assert_eq!(table.find_first_value(0, "user3").unwrap(), Some(2));
        assert_eq!(table.find_first_value(2, Value::Null).unwrap(), Some(0));
        assert!(table.find_first_value(1, "user3").is_err());
    }

    #[test]
    fn test_float_lookup_agrees_with_index() {
        let table = Table::new("zeros", vec![ColumnSpec::new("x", ColumnType::Double)]);
        for x in [-0.0f64, 0.0, f64::NAN] {
            table.add_row(vec![x.into()]).unwrap();
        }

        let scanned = table.find_first_value(0, 0.0f64).unwrap();
        let scanned_nan = table.find_first_value(0, f64::NAN).unwrap();
        let all_zeros = table.find_all_value(0, 0.0f64).unwrap().row_keys().to_vec();
        table.add_search_index(0).unwrap();

        assert_eq!(scanned, Some(0));
        assert_eq!(table.find_first_value(0, 0.0f64).unwrap(), scanned);
        assert_eq!(table.find_first_value(0, -0.0f64).unwrap(), scanned);
        assert_eq!(scanned_nan, None);
        assert_eq!(table.find_first_value(0, f64::NAN).unwrap(), None);
        assert_eq!(table.find_all_value(0, 0.0f64).unwrap().row_keys(), &all_zeros[..]);
        assert_eq!(all_zeros.len(), 2);
    }

    #[test]
    fn test_find_all_value() {
        let table = scores_table();
        let view = table.find_all_value(1, 770i64).unwrap();
        assert_eq!(view.size().unwrap(), 2);
        assert_eq!(view.source_row_index(1).unwrap(), 3);

        table.add_search_index(1).unwrap();
        let indexed = table.find_all_value(1, 770i64).unwrap();
        assert_eq!(indexed.row_keys(), view.row_keys());

        assert_eq!(table.find_all_value(2, Value::Null).unwrap().size().unwrap(), 4);
        assert!(matches!(
            table.find_all_value(1, "770"),
            Err(QueryError::TypeMismatch { column: 1, .. })
        ));
    }

    #[test]
    fn test_index_rejects_unsupported_types() {
        let table = Table::new("blobs", vec![ColumnSpec::new("data", ColumnType::Binary)]);
        assert!(matches!(
            table.add_search_index(0),
            Err(QueryError::UnsupportedColumnType { column: 0, .. })
        ));
        assert!(matches!(
            table.add_search_index(5),
            Err(QueryError::ColumnOutOfRange { .. })
        ));
    }

    #[test]
    fn test_close_invalidates() {
        let table = scores_table();
        let other = table.clone();
        table.close();
        assert!(!other.is_valid());
        assert_eq!(other.size(), Err(QueryError::TableInvalid));
        assert_eq!(other.add_row(vec![]), Err(QueryError::TableInvalid));
        assert!(matches!(other.query(), Err(QueryError::TableInvalid)));
    }
}
