pub mod query;
pub mod view;

pub use query::*;
pub use view::*;
