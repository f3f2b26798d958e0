//! Fluent query bound to a table and optionally a base view

use super::aggregate::AggregateKind;
use super::builder::PredicateBuilder;
use super::executor::{remove_matching, QueryExecutor};
use super::predicate::{Case, PredicateTree};
use super::window::ResultWindow;
use crate::error::{QueryError, QueryResult};
use crate::table::{RowKey, Table};
use crate::value::Value;
use crate::view::{Origin, View};

/// A predicate under construction plus the rows it runs over.
///
/// The predicate is rebuilt for every operation, so the same query can
/// count, then find, then remove.
#[derive(Debug, Clone)]
pub struct Query {
    table: Table,
    builder: PredicateBuilder,
    base: Option<Vec<RowKey>>,
}

impl Query {
    pub(crate) fn new(table: Table) -> QueryResult<Self> {
        let schema = table.schema()?;
        Ok(Self {
            table,
            builder: PredicateBuilder::new(schema),
            base: None,
        })
    }

    /// Start a query restricted to the rows of a view, in the view's order
    pub fn in_view(view: &View) -> QueryResult<Self> {
        let mut query = Self::new(view.table()?)?;
        query.base = Some(view.row_keys().to_vec());
        Ok(query)
    }

    /// Table the query runs against
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Underlying predicate builder
    pub fn builder(&self) -> &PredicateBuilder {
        &self.builder
    }

    /// Check if the query scans a base view
    pub fn has_base_view(&self) -> bool {
        self.base.is_some()
    }

    /// Build the current predicate tree
    pub fn tree(&self) -> QueryResult<PredicateTree> {
        self.builder.build()
    }

    pub fn equal_to(&mut self, column: usize, value: impl Into<Value>) -> QueryResult<&mut Self> {
        self.builder.equal_to(column, value)?;
        Ok(self)
    }

    pub fn not_equal_to(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.builder.not_equal_to(column, value)?;
        Ok(self)
    }

    pub fn less_than(&mut self, column: usize, value: impl Into<Value>) -> QueryResult<&mut Self> {
        self.builder.less_than(column, value)?;
        Ok(self)
    }

    pub fn less_than_or_equal(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.builder.less_than_or_equal(column, value)?;
        Ok(self)
    }

    pub fn greater_than(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.builder.greater_than(column, value)?;
        Ok(self)
    }

    pub fn greater_than_or_equal(
        &mut self,
        column: usize,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.builder.greater_than_or_equal(column, value)?;
        Ok(self)
    }

    pub fn between(
        &mut self,
        column: usize,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.builder.between(column, lo, hi)?;
        Ok(self)
    }

    pub fn equal_to_case(&mut self, column: usize, text: &str, case: Case) -> QueryResult<&mut Self> {
        self.builder.equal_to_case(column, text, case)?;
        Ok(self)
    }

    pub fn not_equal_to_case(
        &mut self,
        column: usize,
        text: &str,
        case: Case,
    ) -> QueryResult<&mut Self> {
        self.builder.not_equal_to_case(column, text, case)?;
        Ok(self)
    }

    pub fn begins_with(&mut self, column: usize, text: &str) -> QueryResult<&mut Self> {
        self.builder.begins_with(column, text)?;
        Ok(self)
    }

    pub fn begins_with_case(
        &mut self,
        column: usize,
        text: &str,
        case: Case,
    ) -> QueryResult<&mut Self> {
        self.builder.begins_with_case(column, text, case)?;
        Ok(self)
    }

    pub fn ends_with(&mut self, column: usize, text: &str) -> QueryResult<&mut Self> {
        self.builder.ends_with(column, text)?;
        Ok(self)
    }

    pub fn ends_with_case(
        &mut self,
        column: usize,
        text: &str,
        case: Case,
    ) -> QueryResult<&mut Self> {
        self.builder.ends_with_case(column, text, case)?;
        Ok(self)
    }

    pub fn contains(&mut self, column: usize, text: &str) -> QueryResult<&mut Self> {
        self.builder.contains(column, text)?;
        Ok(self)
    }

    pub fn contains_case(&mut self, column: usize, text: &str, case: Case) -> QueryResult<&mut Self> {
        self.builder.contains_case(column, text, case)?;
        Ok(self)
    }

    pub fn is_null(&mut self, column: usize) -> QueryResult<&mut Self> {
        self.builder.is_null(column)?;
        Ok(self)
    }

    pub fn is_not_null(&mut self, column: usize) -> QueryResult<&mut Self> {
        self.builder.is_not_null(column)?;
        Ok(self)
    }

    pub fn group(&mut self) -> QueryResult<&mut Self> {
        self.builder.group()?;
        Ok(self)
    }

    pub fn end_group(&mut self) -> QueryResult<&mut Self> {
        self.builder.end_group()?;
        Ok(self)
    }

    pub fn or(&mut self) -> QueryResult<&mut Self> {
        self.builder.or()?;
        Ok(self)
    }

    pub fn not(&mut self) -> QueryResult<&mut Self> {
        self.builder.not()?;
        Ok(self)
    }

    fn run<T>(
        &self,
        op: impl FnOnce(&QueryExecutor<'_, crate::table::store::TableInner>) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let tree = self.builder.build()?;
        let inner = self.table.read()?;
        let mut executor = QueryExecutor::new(&*inner, &tree);
        if let Some(keys) = &self.base {
            executor = executor.in_view(keys);
        }
        op(&executor)
    }

    /// Scan position of the first match: a table row position, or an index
    /// into the base view
    pub fn find_first(&self, window: &ResultWindow) -> QueryResult<Option<usize>> {
        self.run(|executor| executor.find_first(window))
    }

    /// First match after scan position `after`, or from the start for None
    pub fn find_next(&self, after: Option<usize>) -> QueryResult<Option<usize>> {
        let start = match after {
            Some(position) => position + 1,
            None => 0,
        };
        self.find_first(&ResultWindow::from(start))
    }

    /// Materialize every match in the window
    pub fn find_all(&self, window: &ResultWindow) -> QueryResult<View> {
        let tree = self.builder.build()?;
        let inner = self.table.read()?;
        let mut executor = QueryExecutor::new(&*inner, &tree);
        if let Some(keys) = &self.base {
            executor = executor.in_view(keys);
        }
        let keys = executor.find_all(window)?;
        let origin = Origin::Query {
            tree,
            base: self.base.clone(),
            window: *window,
        };
        Ok(View::new(&self.table, keys, inner.version(), origin))
    }

    /// Number of matches in the window
    pub fn count(&self, window: &ResultWindow) -> QueryResult<usize> {
        self.run(|executor| executor.count(window))
    }

    /// Remove every match in the window, returning the number removed
    pub fn remove(&self, window: &ResultWindow) -> QueryResult<usize> {
        let tree = self.builder.build()?;
        let mut inner = self.table.write()?;
        remove_matching(&mut *inner, &tree, self.base.as_deref(), window)
    }

    /// Aggregate a column over the matches in the window
    pub fn aggregate(
        &self,
        column: usize,
        kind: AggregateKind,
        window: &ResultWindow,
    ) -> QueryResult<Option<Value>> {
        self.run(|executor| executor.aggregate(column, kind, window))
    }

    /// Sum of a numeric column over every match
    pub fn sum(&self, column: usize) -> QueryResult<Value> {
        self.aggregate(column, AggregateKind::Sum, &ResultWindow::all())?
            .ok_or(QueryError::EmptyAggregate("sum"))
    }

    /// Smallest value over every match, None without matches
    pub fn minimum(&self, column: usize) -> QueryResult<Option<Value>> {
        self.aggregate(column, AggregateKind::Minimum, &ResultWindow::all())
    }

    /// Largest value over every match, None without matches
    pub fn maximum(&self, column: usize) -> QueryResult<Option<Value>> {
        self.aggregate(column, AggregateKind::Maximum, &ResultWindow::all())
    }

    /// Mean of a numeric column over every match
    pub fn average(&self, column: usize) -> QueryResult<f64> {
        match self.aggregate(column, AggregateKind::Average, &ResultWindow::all())? {
            Some(Value::Double(mean)) => Ok(mean),
            _ => Err(QueryError::EmptyAggregate("average")),
        }
    }

    /// Number of matches holding a non-null value in a column
    pub fn count_values(&self, column: usize) -> QueryResult<usize> {
        match self.aggregate(column, AggregateKind::Count, &ResultWindow::all())? {
            Some(Value::Int(count)) => Ok(count as usize),
            _ => Ok(0),
        }
    }
}
