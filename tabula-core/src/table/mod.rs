//! Column-addressable table store
//!
//! The query layer reads tables through [`ColumnAccessor`] and mutates them
//! through [`ColumnMutator`]. [`Table`] is the in-memory implementation used
//! by queries and views.

pub mod accessor;
pub mod store;

pub use accessor::{ColumnAccessor, ColumnMutator};
pub use store::Table;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a row.
///
/// Keys are assigned once at insertion and never reused, so a key held by a
/// view either resolves to the same row or to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey(pub u64);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
