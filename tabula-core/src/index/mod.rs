//! Value-lookup indexes
//!
//! A table may carry one search index per column. Indexes are maintained by
//! the table on every mutation and are required by `distinct`.

pub mod search;

pub use search::{IndexKey, SearchIndex};
