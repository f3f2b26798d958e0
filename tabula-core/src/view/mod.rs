//! Materialized views
//!
//! A view is a frozen snapshot of row keys taken from one table. It does not
//! follow later table mutations: every operation resolves its stored keys
//! against the table at the time of use and fails with a row-removed error if
//! a key no longer exists. [`View::sync`] recomputes the keys from the rows
//! the view was produced from. Views hold a weak table reference, so closing
//! or dropping the table invalidates them.

pub mod sort;

pub use sort::{Order, SortDescriptor};

use crate::error::{QueryError, QueryResult};
use crate::query::{AggregateKind, PredicateTree, Query, QueryExecutor, ResultWindow};
use crate::table::store::TableInner;
use crate::table::{ColumnAccessor, ColumnMutator, RowKey, Table};
use crate::value::{ColumnType, Value};
use parking_lot::RwLock;
use sort::sort_keys;
use std::collections::HashSet;
use std::sync::Weak;
use tracing::debug;

/// Source of a view's rows, replayed by [`View::sync`]
#[derive(Debug, Clone)]
pub(crate) enum Origin {
    /// Every table row in position order
    Table,
    /// Matches of a tree in a window, over the table or a base key list
    Query {
        tree: PredicateTree,
        base: Option<Vec<RowKey>>,
        window: ResultWindow,
    },
}

/// Step applied on top of the origin
#[derive(Debug, Clone)]
enum Derivation {
    Sort(SortDescriptor),
    Distinct(usize),
}

/// Ordered sequence of row keys from one table
#[derive(Debug, Clone)]
pub struct View {
    table: Weak<RwLock<TableInner>>,
    keys: Vec<RowKey>,
    /// Table version when the keys were materialized
    version: u64,
    origin: Origin,
    /// Applied in order after the origin
    derivations: Vec<Derivation>,
}

impl View {
    pub(crate) fn new(table: &Table, keys: Vec<RowKey>, version: u64, origin: Origin) -> Self {
        Self {
            table: table.downgrade(),
            keys,
            version,
            origin,
            derivations: Vec::new(),
        }
    }

    pub(crate) fn with_distinct(mut self, column: usize) -> Self {
        self.derivations.push(Derivation::Distinct(column));
        self
    }

    fn with_sort(mut self, descriptor: SortDescriptor) -> Self {
        self.derivations.push(Derivation::Sort(descriptor));
        self
    }

    /// New view sharing this view's origin and derivations
    fn derived(&self, keys: Vec<RowKey>, version: u64) -> Self {
        Self {
            table: self.table.clone(),
            keys,
            version,
            origin: self.origin.clone(),
            derivations: self.derivations.clone(),
        }
    }

    /// Source table, failing if it was closed or dropped
    pub fn table(&self) -> QueryResult<Table> {
        let table = self
            .table
            .upgrade()
            .map(Table::from_shared)
            .ok_or(QueryError::TableInvalid)?;
        if table.is_valid() {
            Ok(table)
        } else {
            Err(QueryError::TableInvalid)
        }
    }

    /// Check if the source table is still usable
    pub fn is_valid(&self) -> bool {
        self.table().is_ok()
    }

    /// Check if the table has not been structurally changed since the view
    /// was materialized
    pub fn is_in_sync(&self) -> bool {
        self.table()
            .map(|table| table.version() == self.version)
            .unwrap_or(false)
    }

    /// Stored keys in view order
    pub fn row_keys(&self) -> &[RowKey] {
        &self.keys
    }

    /// Sort applied when the view was derived, if any
    pub fn sort_descriptor(&self) -> Option<&SortDescriptor> {
        match self.derivations.last() {
            Some(Derivation::Sort(descriptor)) => Some(descriptor),
            _ => None,
        }
    }

    /// Column the view was made distinct on, if any
    pub fn distinct_column(&self) -> Option<usize> {
        match self.derivations.last() {
            Some(Derivation::Distinct(column)) => Some(*column),
            _ => None,
        }
    }

    /// Number of rows in the view
    pub fn size(&self) -> QueryResult<usize> {
        self.table()?;
        Ok(self.keys.len())
    }

    /// Check if the view has no rows
    pub fn is_empty(&self) -> QueryResult<bool> {
        Ok(self.size()? == 0)
    }

    fn check_index(&self, index: usize) -> QueryResult<RowKey> {
        self.keys
            .get(index)
            .copied()
            .ok_or(QueryError::RowOutOfRange {
                index,
                count: self.keys.len(),
            })
    }

    /// Key stored at a view-local index
    pub fn row_key(&self, index: usize) -> QueryResult<RowKey> {
        self.table()?;
        self.check_index(index)
    }

    /// Current table position of the row at a view-local index
    pub fn source_row_index(&self, index: usize) -> QueryResult<usize> {
        let table = self.table()?;
        let key = self.check_index(index)?;
        let inner = table.read()?;
        inner.require_position(key)
    }

    /// Read a cell of the row at a view-local index
    pub fn get(&self, column: usize, index: usize) -> QueryResult<Value> {
        let table = self.table()?;
        let key = self.check_index(index)?;
        let inner = table.read()?;
        let row = inner.require_position(key)?;
        inner.read_value(column, row).cloned()
    }

    /// Write a cell of the row at a view-local index
    pub fn set(&self, column: usize, index: usize, value: impl Into<Value>) -> QueryResult<()> {
        let table = self.table()?;
        let key = self.check_index(index)?;
        let mut inner = table.write()?;
        let row = inner.require_position(key)?;
        inner.write_value(column, row, value.into())
    }

    /// Remove the row at a view-local index from the table and from the view.
    ///
    /// Later view-local indices shift down by one.
    pub fn remove(&mut self, index: usize) -> QueryResult<()> {
        let table = self.table()?;
        let key = self.check_index(index)?;
        let mut inner = table.write()?;
        let row = inner.require_position(key)?;

        let was_in_sync = inner.version() == self.version;
        inner.remove_row(row)?;
        self.keys.remove(index);
        if was_in_sync {
            self.version = inner.version();
        }
        Ok(())
    }

    /// Remove the last row of the view
    pub fn remove_last(&mut self) -> QueryResult<()> {
        match self.keys.len() {
            0 => Err(QueryError::RowOutOfRange { index: 0, count: 0 }),
            len => self.remove(len - 1),
        }
    }

    /// Remove every row of the view from the table.
    ///
    /// All keys are resolved before the first removal.
    pub fn clear(&mut self) -> QueryResult<()> {
        let table = self.table()?;
        let mut inner = table.write()?;

        let mut positions = self
            .keys
            .iter()
            .map(|key| inner.require_position(*key))
            .collect::<QueryResult<Vec<_>>>()?;
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();

        let was_in_sync = inner.version() == self.version;
        for &row in &positions {
            inner.remove_row(row)?;
        }
        debug!("Cleared {} rows through view", positions.len());

        self.keys.clear();
        if was_in_sync {
            self.version = inner.version();
        }
        Ok(())
    }

    /// New view with the same rows ordered by one column, stable on ties
    pub fn sort(&self, column: usize, order: Order) -> QueryResult<View> {
        self.sort_by(&SortDescriptor::new(column, order))
    }

    /// New view with the same rows ordered by several columns, stable on ties
    pub fn sort_by(&self, descriptor: &SortDescriptor) -> QueryResult<View> {
        let table = self.table()?;
        let inner = table.read()?;
        let keys = sort_keys(&*inner, &self.keys, descriptor)?;
        Ok(self
            .derived(keys, inner.version())
            .with_sort(descriptor.clone()))
    }

    /// New view keeping the first row, in position order, for each distinct
    /// value of an indexed column. Rows come out in value order.
    pub fn distinct(&self, column: usize) -> QueryResult<View> {
        let table = self.table()?;
        let inner = table.read()?;
        let keys = distinct_keys(&*inner, column, Some(&self.keys))?;
        Ok(self.derived(keys, inner.version()).with_distinct(column))
    }

    /// View-local index of the first row holding exactly `value`
    pub fn find_first_value(
        &self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<Option<usize>> {
        let value = value.into();
        let table = self.table()?;
        let inner = table.read()?;
        inner.column_spec(column)?.check_value(column, &value)?;

        let tree = PredicateTree::value_lookup(column, value);
        QueryExecutor::new(&*inner, &tree)
            .in_view(&self.keys)
            .find_first(&ResultWindow::all())
    }

    /// New view of the rows holding exactly `value`, in this view's order
    pub fn find_all_value(&self, column: usize, value: impl Into<Value>) -> QueryResult<View> {
        let value = value.into();
        let table = self.table()?;
        let inner = table.read()?;
        inner.column_spec(column)?.check_value(column, &value)?;

        let tree = PredicateTree::value_lookup(column, value);
        let window = ResultWindow::all();
        let keys = QueryExecutor::new(&*inner, &tree)
            .in_view(&self.keys)
            .find_all(&window)?;
        let origin = Origin::Query {
            tree,
            base: Some(self.keys.clone()),
            window,
        };
        Ok(View::new(&table, keys, inner.version(), origin))
    }

    /// Recompute the view against the current table and return the version
    /// it is now in sync with.
    ///
    /// Query views re-run their predicate and window. Base rows removed since
    /// the query ran are dropped from the base first, and a window reaching
    /// past the remaining rows is clamped. Sort and distinct steps are then
    /// replayed in the order they were applied.
    pub fn sync(&mut self) -> QueryResult<u64> {
        let table = self.table()?;
        let inner = table.read()?;

        let mut keys = match &mut self.origin {
            Origin::Table => inner.keys().to_vec(),
            Origin::Query { tree, base, window } => match base {
                Some(base) => {
                    base.retain(|key| inner.position_of(*key).is_some());
                    QueryExecutor::new(&*inner, tree)
                        .in_view(base.as_slice())
                        .find_all(&window.clamp(base.len()))?
                }
                None => QueryExecutor::new(&*inner, tree)
                    .find_all(&window.clamp(inner.row_count()))?,
            },
        };
        for derivation in &self.derivations {
            keys = match derivation {
                Derivation::Sort(descriptor) => sort_keys(&*inner, &keys, descriptor)?,
                Derivation::Distinct(column) => distinct_keys(&*inner, *column, Some(&keys))?,
            };
        }

        self.keys = keys;
        self.version = inner.version();
        debug!(
            "Synced view of {} to version {} with {} rows",
            inner.table_name(),
            self.version,
            self.keys.len()
        );
        Ok(self.version)
    }

    /// Aggregate a column over every row of the view
    pub fn aggregate(&self, column: usize, kind: AggregateKind) -> QueryResult<Option<Value>> {
        let table = self.table()?;
        let inner = table.read()?;
        let tree = PredicateTree::match_all();
        QueryExecutor::new(&*inner, &tree)
            .in_view(&self.keys)
            .aggregate(column, kind, &ResultWindow::all())
    }

    pub fn sum(&self, column: usize) -> QueryResult<Value> {
        self.aggregate(column, AggregateKind::Sum)?
            .ok_or(QueryError::EmptyAggregate("sum"))
    }

    pub fn minimum(&self, column: usize) -> QueryResult<Option<Value>> {
        self.aggregate(column, AggregateKind::Minimum)
    }

    pub fn maximum(&self, column: usize) -> QueryResult<Option<Value>> {
        self.aggregate(column, AggregateKind::Maximum)
    }

    pub fn average(&self, column: usize) -> QueryResult<f64> {
        match self.aggregate(column, AggregateKind::Average)? {
            Some(Value::Double(mean)) => Ok(mean),
            _ => Err(QueryError::EmptyAggregate("average")),
        }
    }

    pub fn count_values(&self, column: usize) -> QueryResult<usize> {
        match self.aggregate(column, AggregateKind::Count)? {
            Some(Value::Int(count)) => Ok(count as usize),
            _ => Ok(0),
        }
    }

    /// Start a query restricted to this view's rows
    pub fn query(&self) -> QueryResult<Query> {
        Query::in_view(self)
    }
}

/// First key per distinct value of an indexed column, in value order.
///
/// With `members`, only those keys are considered and each must still exist.
pub(crate) fn distinct_keys<A: ColumnAccessor + ?Sized>(
    accessor: &A,
    column: usize,
    members: Option<&[RowKey]>,
) -> QueryResult<Vec<RowKey>> {
    let column_type = accessor.column_type(column)?;
    if matches!(
        column_type,
        ColumnType::Any | ColumnType::Table | ColumnType::Binary
    ) {
        return Err(QueryError::UnsupportedColumnType {
            operation: "distinct",
            column,
            column_type,
        });
    }
    let index = accessor
        .search_index(column)
        .ok_or(QueryError::MissingIndex(column))?;

    let keys = match members {
        None => index
            .iter()
            .filter_map(|(_, rows)| rows.first().copied())
            .collect(),
        Some(members) => {
            for key in members {
                accessor.require_position(*key)?;
            }
            let members: HashSet<RowKey> = members.iter().copied().collect();
            index
                .iter()
                .filter_map(|(_, rows)| rows.iter().find(|key| members.contains(key)).copied())
                .collect()
        }
    };

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;

    fn scores() -> Table {
        let table = Table::new(
            "scores",
            vec![
                ColumnSpec::new("name", ColumnType::String),
                ColumnSpec::new("score", ColumnType::Int),
                ColumnSpec::new("completed", ColumnType::Bool),
                ColumnSpec::new("bonus", ColumnType::Double).nullable(),
            ],
        );
        let rows = [
            ("user1", 420i64, false, Some(1.0f64)),
            ("user2", 770, false, None),
            ("user3", 327, false, Some(2.5)),
            ("user4", 770, false, None),
        ];
        for (name, score, completed, bonus) in rows {
            table
                .add_row(vec![name.into(), score.into(), completed.into(), bonus.into()])
                .unwrap();
        }
        table
    }

    fn names(view: &View) -> Vec<Value> {
        (0..view.size().unwrap())
            .map(|i| view.get(0, i).unwrap())
            .collect()
    }

    #[test]
    fn test_row_access() {
        let table = scores();
        let view = table.view().unwrap();
        assert_eq!(view.size().unwrap(), 4);
        assert_eq!(view.get(1, 2).unwrap(), Value::Int(327));
        view.set(1, 2, 328i64).unwrap();
        assert_eq!(table.get(1, 2).unwrap(), Value::Int(328));
        assert!(matches!(
            view.get(0, 9),
            Err(QueryError::RowOutOfRange { index: 9, count: 4 })
        ));
    }

    #[test]
    fn test_remove_through_view_shifts_view_indices() {
        let table = scores();
        let mut view = table.view().unwrap();
        view.remove(1).unwrap();
        assert_eq!(view.size().unwrap(), 3);
        assert_eq!(view.get(0, 1).unwrap(), Value::from("user3"));
        assert!(view.is_in_sync());
        assert_eq!(table.size().unwrap(), 3);

        view.remove_last().unwrap();
        assert_eq!(names(&view), vec![Value::from("user1"), Value::from("user3")]);
    }

    #[test]
    fn test_frozen_snapshot_fails_on_removed_rows() {
        let table = scores();
        let mut view = table.view().unwrap();
        table.remove(0).unwrap();

        assert!(!view.is_in_sync());
        assert_eq!(view.size().unwrap(), 4);
        assert_eq!(view.get(0, 0), Err(QueryError::RowRemoved(0)));
        assert_eq!(view.get(0, 1).unwrap(), Value::from("user2"));
        assert_eq!(view.source_row_index(1).unwrap(), 0);
        assert_eq!(view.remove(0), Err(QueryError::RowRemoved(0)));
        assert_eq!(view.clear(), Err(QueryError::RowRemoved(0)));
        assert_eq!(table.size().unwrap(), 3);
    }

    #[test]
    fn test_clear_removes_only_view_rows() {
        let table = scores();
        let mut query = table.query().unwrap();
        query.equal_to(1, 770i64).unwrap();
        let mut view = query.find_all(&ResultWindow::all()).unwrap();
        view.clear().unwrap();
        assert!(view.is_empty().unwrap());
        assert_eq!(table.size().unwrap(), 2);
    }

    #[test]
    fn test_sort_is_stable() {
        let table = scores();
        let view = table.view().unwrap();
        let sorted = view.sort(1, Order::Ascending).unwrap();
        assert_eq!(
            names(&sorted),
            vec![
                Value::from("user3"),
                Value::from("user1"),
                Value::from("user2"),
                Value::from("user4"),
            ]
        );
        let descending = view.sort(1, Order::Descending).unwrap();
        assert_eq!(
            names(&descending),
            vec![
                Value::from("user2"),
                Value::from("user4"),
                Value::from("user1"),
                Value::from("user3"),
            ]
        );
        assert_eq!(
            descending.sort_descriptor(),
            Some(&SortDescriptor::new(1, Order::Descending))
        );
    }

    #[test]
    fn test_sort_nulls_first_and_multi_column() {
        let table = scores();
        let view = table.view().unwrap();
        let by_bonus = view.sort(3, Order::Ascending).unwrap();
        assert_eq!(by_bonus.get(3, 0).unwrap(), Value::Null);
        assert_eq!(by_bonus.get(3, 1).unwrap(), Value::Null);
        assert_eq!(by_bonus.get(3, 3).unwrap(), Value::Double(2.5));

        let descriptor = SortDescriptor::new(2, Order::Ascending).then(1, Order::Descending);
        let sorted = view.sort_by(&descriptor).unwrap();
        assert_eq!(sorted.get(0, 0).unwrap(), Value::from("user2"));
        assert_eq!(sorted.get(0, 3).unwrap(), Value::from("user3"));
    }

    #[test]
    fn test_sort_rejects_text() {
        let table = scores();
        let view = table.view().unwrap();
        assert!(matches!(
            view.sort(0, Order::Ascending),
            Err(QueryError::UnsupportedSortType { column: 0, .. })
        ));
    }

    #[test]
    fn test_distinct() {
        let table = scores();
        let view = table.view().unwrap();
        assert_eq!(view.distinct(1).unwrap_err(), QueryError::MissingIndex(1));

        table.add_search_index(1).unwrap();
        let distinct = view.distinct(1).unwrap();
        assert_eq!(distinct.distinct_column(), Some(1));
        assert_eq!(
            names(&distinct),
            vec![Value::from("user3"), Value::from("user1"), Value::from("user2")]
        );

        let sorted = view.sort(1, Order::Descending).unwrap();
        let subset = sorted.distinct(1).unwrap();
        assert_eq!(subset.size().unwrap(), 3);
    }

    #[test]
    fn test_distinct_type_checked_before_index() {
        let table = Table::new("mixed", vec![ColumnSpec::new("any", ColumnType::Any)]);
        table.add_row(vec![Value::Int(1)]).unwrap();
        let view = table.view().unwrap();
        assert!(matches!(
            view.distinct(0),
            Err(QueryError::UnsupportedColumnType { column: 0, .. })
        ));
    }

    #[test]
    fn test_view_aggregates() {
        let table = scores();
        let view = table.view().unwrap();
        assert_eq!(view.sum(1).unwrap(), Value::Int(2287));
        assert_eq!(view.maximum(1).unwrap(), Some(Value::Int(770)));
        assert_eq!(view.count_values(3).unwrap(), 2);
        assert!((view.average(3).unwrap() - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_find_value_in_view_order() {
        let table = scores();
        let view = table.view().unwrap().sort(1, Order::Descending).unwrap();
        assert_eq!(view.find_first_value(1, 770i64).unwrap(), Some(0));
        assert_eq!(view.find_first_value(1, 420i64).unwrap(), Some(2));
        assert_eq!(view.find_first_value(1, 1i64).unwrap(), None);
        assert_eq!(view.find_first_value(3, Value::Null).unwrap(), Some(0));
        assert!(matches!(
            view.find_first_value(0, 1i64),
            Err(QueryError::TypeMismatch { column: 0, .. })
        ));

        let found = view.find_all_value(3, Value::Null).unwrap();
        assert_eq!(names(&found), vec![Value::from("user2"), Value::from("user4")]);

        table.remove(1).unwrap();
        assert_eq!(view.find_first_value(1, 770i64), Err(QueryError::RowRemoved(1)));
    }

    #[test]
    fn test_sync_reruns_query() {
        let table = scores();
        let mut query = table.query().unwrap();
        query.equal_to(1, 770i64).unwrap();
        let mut view = query.find_all(&ResultWindow::all()).unwrap();
        assert_eq!(view.size().unwrap(), 2);

        table.remove(1).unwrap();
        table
            .add_row(vec!["user5".into(), 770i64.into(), true.into(), Value::Null])
            .unwrap();
        table.set(1, 1, 770i64).unwrap();
        assert!(!view.is_in_sync());
        assert_eq!(view.get(0, 0), Err(QueryError::RowRemoved(1)));

        assert_eq!(view.sync().unwrap(), table.version());
        assert!(view.is_in_sync());
        assert_eq!(
            names(&view),
            vec![Value::from("user3"), Value::from("user4"), Value::from("user5")]
        );
    }

    #[test]
    fn test_sync_replays_base_window_and_sort() {
        let table = scores();
        let by_score = table.view().unwrap().sort(1, Order::Descending).unwrap();
        let mut query = by_score.query().unwrap();
        query.less_than(1, 800i64).unwrap();
        let mut top = query.find_all(&ResultWindow::range(0, 3).unwrap()).unwrap();
        let mut ascending = top.sort(1, Order::Ascending).unwrap();
        assert_eq!(
            names(&ascending),
            vec![Value::from("user1"), Value::from("user2"), Value::from("user4")]
        );

        table.remove(0).unwrap();
        top.sync().unwrap();
        ascending.sync().unwrap();
        assert_eq!(
            names(&top),
            vec![Value::from("user2"), Value::from("user4"), Value::from("user3")]
        );
        assert_eq!(
            names(&ascending),
            vec![Value::from("user3"), Value::from("user2"), Value::from("user4")]
        );
        assert_eq!(
            ascending.sort_descriptor(),
            Some(&SortDescriptor::new(1, Order::Ascending))
        );

        table.clear().unwrap();
        assert_eq!(top.sync().unwrap(), table.version());
        assert!(top.is_empty().unwrap());
    }

    #[test]
    fn test_sync_table_and_distinct_views() {
        let table = scores();
        table.add_search_index(1).unwrap();
        let mut all = table.view().unwrap();
        let mut distinct = table.distinct(1).unwrap();

        table.remove(1).unwrap();
        table
            .add_row(vec!["user5".into(), 100i64.into(), false.into(), Value::Null])
            .unwrap();
        all.sync().unwrap();
        distinct.sync().unwrap();

        assert_eq!(all.size().unwrap(), 4);
        assert_eq!(all.get(0, 3).unwrap(), Value::from("user5"));
        assert_eq!(distinct.distinct_column(), Some(1));
        assert_eq!(
            names(&distinct),
            vec![
                Value::from("user5"),
                Value::from("user3"),
                Value::from("user1"),
                Value::from("user4"),
            ]
        );

        table.close();
        assert_eq!(all.sync(), Err(QueryError::TableInvalid));
    }

    #[test]
    fn test_invalid_after_close_or_drop() {
        let table = scores();
        let view = table.view().unwrap();
        table.close();
        assert!(!view.is_valid());
        assert_eq!(view.size(), Err(QueryError::TableInvalid));

        let view = {
            let table = scores();
            table.view().unwrap()
        };
        assert_eq!(view.get(0, 0), Err(QueryError::TableInvalid));
        assert!(matches!(view.query(), Err(QueryError::TableInvalid)));
    }
}
