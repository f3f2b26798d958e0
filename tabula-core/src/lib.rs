//! Tabula Core - typed tables, predicate queries and views
//!
//! This crate provides the query layer of Tabula:
//! - A column-addressable in-memory table with stable row keys
//! - A predicate algebra with AND/OR/grouping, validated at build time
//! - Execution modes: find first, find all, count, aggregate, remove
//! - Views: frozen row-key snapshots with sort and distinct derivation

pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod query;
pub mod schema;
pub mod table;
pub mod value;
pub mod view;

pub use config::{EngineSettings, TabulaConfig};
pub use error::{ErrorKind, QueryError, QueryResult};
pub use index::SearchIndex;
pub use logging::{init_logging, LoggingConfig, SlowQuery};
pub use query::{
    AggregateKind, Case, PredicateBuilder, PredicateTree, Query, QueryDescriptor,
    QueryExecutor, QueryStep, ResultWindow,
};
pub use schema::{ColumnSpec, TableSchema};
pub use table::{ColumnAccessor, ColumnMutator, RowKey, Table};
pub use value::{ColumnType, Value};
pub use view::{Order, SortDescriptor, View};
