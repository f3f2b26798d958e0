//! Sort descriptors and stable row ordering

use crate::error::{QueryError, QueryResult};
use crate::table::{ColumnAccessor, RowKey};
use crate::value::ColumnType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Ordered list of sort columns; later columns break ties of earlier ones
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortDescriptor {
    columns: Vec<(usize, Order)>,
}

impl SortDescriptor {
    /// Sort by a single column
    pub fn new(column: usize, order: Order) -> Self {
        Self {
            columns: vec![(column, order)],
        }
    }

    /// Add a tie-breaking column
    pub fn then(mut self, column: usize, order: Order) -> Self {
        self.columns.push((column, order));
        self
    }

    pub fn columns(&self) -> &[(usize, Order)] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Check that a column type has a total order usable for sorting
pub(crate) fn check_sortable(column: usize, column_type: ColumnType) -> QueryResult<()> {
    match column_type {
        ColumnType::Int
        | ColumnType::Float
        | ColumnType::Double
        | ColumnType::Bool
        | ColumnType::Timestamp => Ok(()),
        _ => Err(QueryError::UnsupportedSortType {
            column,
            column_type,
        }),
    }
}

/// Stable sort of row keys by the descriptor's columns.
///
/// Every key must still resolve to a row. Nulls order first ascending.
pub(crate) fn sort_keys<A: ColumnAccessor + ?Sized>(
    accessor: &A,
    keys: &[RowKey],
    descriptor: &SortDescriptor,
) -> QueryResult<Vec<RowKey>> {
    for &(column, _) in descriptor.columns() {
        check_sortable(column, accessor.column_type(column)?)?;
    }

    let mut rows = Vec::with_capacity(keys.len());
    for &key in keys {
        rows.push((key, accessor.require_position(key)?));
    }

    let mut failure = None;
    rows.sort_by(|(_, a), (_, b)| {
        for &(column, order) in descriptor.columns() {
            let ordering = match (accessor.read_value(column, *a), accessor.read_value(column, *b)) {
                (Ok(left), Ok(right)) => left.sort_cmp(right),
                (Err(err), _) | (_, Err(err)) => {
                    failure.get_or_insert(err);
                    Ordering::Equal
                }
            };
            let ordering = match order {
                Order::Ascending => ordering,
                Order::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(rows.into_iter().map(|(key, _)| key).collect()),
    }
}
