//! Query engine for Tabula
//!
//! This module provides the predicate algebra and its execution:
//! - predicate trees and the builder that validates them
//! - the matcher evaluating a tree against one row
//! - result windows, the executor and aggregates
//! - the `Query` handle and serializable query descriptors

pub mod aggregate;
pub mod builder;
pub mod descriptor;
pub mod executor;
pub mod handle;
pub mod matcher;
pub mod predicate;
pub mod window;

pub use aggregate::{Accumulator, AggregateKind};
pub use builder::PredicateBuilder;
pub use descriptor::{QueryDescriptor, QueryStep};
pub use executor::{remove_matching, QueryExecutor};
pub use handle::Query;
pub use matcher::Matcher;
pub use predicate::{Case, Group, Node, Operator, Predicate, PredicateTree};
pub use window::ResultWindow;
