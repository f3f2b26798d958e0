//! Query executor
//!
//! Drives the matcher over scan positions. Without a base view the scan
//! positions are table row positions; with a base view they are indices into
//! the view, visited in the view's stored order.

use super::aggregate::{Accumulator, AggregateKind};
use super::matcher::Matcher;
use super::predicate::PredicateTree;
use super::window::ResultWindow;
use crate::error::QueryResult;
use crate::logging::QueryTracker;
use crate::table::{ColumnAccessor, ColumnMutator, RowKey};
use crate::value::Value;
use tracing::debug;

/// Outcome of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ScanStats {
    matches: usize,
    scanned: usize,
}

/// Executes one predicate tree against an accessor
pub struct QueryExecutor<'a, A: ColumnAccessor + ?Sized> {
    accessor: &'a A,
    tree: &'a PredicateTree,
    base: Option<&'a [RowKey]>,
}

impl<'a, A: ColumnAccessor + ?Sized> QueryExecutor<'a, A> {
    /// Create an executor scanning every table row
    pub fn new(accessor: &'a A, tree: &'a PredicateTree) -> Self {
        Self {
            accessor,
            tree,
            base: None,
        }
    }

    /// Restrict the scan to the rows of a base view, in the view's order
    pub fn in_view(mut self, keys: &'a [RowKey]) -> Self {
        self.base = Some(keys);
        self
    }

    /// Number of scan positions
    pub fn scan_size(&self) -> usize {
        match self.base {
            Some(keys) => keys.len(),
            None => self.accessor.row_count(),
        }
    }

    /// Table row position behind a scan position
    fn position_at(&self, scan: usize) -> QueryResult<usize> {
        match self.base {
            Some(keys) => self.accessor.require_position(keys[scan]),
            None => Ok(scan),
        }
    }

    /// Visit matches in scan order until the window or its limit is exhausted
    fn scan<F>(&self, window: &ResultWindow, mut visit: F) -> QueryResult<ScanStats>
    where
        F: FnMut(usize, usize) -> QueryResult<()>,
    {
        let range = window.resolve(self.scan_size())?;
        let mut stats = ScanStats::default();

        let limit = match window.max_matches() {
            Some(0) => return Ok(stats),
            Some(limit) => limit,
            None => usize::MAX,
        };

        let matcher = Matcher::new(self.accessor, self.tree);
        for scan in range {
            let row = self.position_at(scan)?;
            stats.scanned += 1;
            if matcher.matches(row)? {
                visit(scan, row)?;
                stats.matches += 1;
                if stats.matches >= limit {
                    break;
                }
            }
        }

        Ok(stats)
    }

    fn start(&self, operation: &'static str) -> Option<QueryTracker> {
        self.accessor
            .slow_query_logger()
            .map(|logger| logger.start_query(operation, self.accessor.table_name()))
    }

    fn finish(
        &self,
        tracker: Option<QueryTracker>,
        operation: &'static str,
        window: &ResultWindow,
        stats: ScanStats,
    ) {
        debug!(
            table = %self.accessor.table_name(),
            operation,
            predicate = %self.tree,
            window = %window,
            in_view = self.base.is_some(),
            scanned = stats.scanned,
            matches = stats.matches,
            "Query executed"
        );
        if let (Some(logger), Some(tracker)) = (self.accessor.slow_query_logger(), tracker) {
            logger.finish_query(tracker, stats.scanned);
        }
    }

    /// Scan position of the first match in the window
    pub fn find_first(&self, window: &ResultWindow) -> QueryResult<Option<usize>> {
        let tracker = self.start("find_first");
        let mut found = None;
        let first_only = match window.max_matches() {
            Some(0) => *window,
            _ => window.with_limit(1),
        };
        let stats = self.scan(&first_only, |scan, _| {
            found = Some(scan);
            Ok(())
        })?;
        self.finish(tracker, "find_first", window, stats);
        Ok(found)
    }

    /// Keys of every match in the window, in scan order
    pub fn find_all(&self, window: &ResultWindow) -> QueryResult<Vec<RowKey>> {
        let tracker = self.start("find_all");
        let mut keys = Vec::new();
        let stats = self.scan(window, |_, row| {
            keys.push(self.accessor.row_key(row)?);
            Ok(())
        })?;
        self.finish(tracker, "find_all", window, stats);
        Ok(keys)
    }

    /// Number of matches in the window
    pub fn count(&self, window: &ResultWindow) -> QueryResult<usize> {
        let tracker = self.start("count");
        let stats = self.scan(window, |_, _| Ok(()))?;
        self.finish(tracker, "count", window, stats);
        Ok(stats.matches)
    }

    /// Table positions of every match in the window, in scan order
    pub fn matching_positions(&self, window: &ResultWindow) -> QueryResult<Vec<usize>> {
        let mut positions = Vec::new();
        self.scan(window, |_, row| {
            positions.push(row);
            Ok(())
        })?;
        Ok(positions)
    }

    /// Aggregate a column over the matches in the window
    pub fn aggregate(
        &self,
        column: usize,
        kind: AggregateKind,
        window: &ResultWindow,
    ) -> QueryResult<Option<Value>> {
        let column_type = self.accessor.column_type(column)?;
        let mut accumulator = Accumulator::new(kind, column, column_type)?;

        let tracker = self.start(kind.as_str());
        let stats = self.scan(window, |_, row| {
            accumulator.push(self.accessor.read_value(column, row)?);
            Ok(())
        })?;
        self.finish(tracker, kind.as_str(), window, stats);

        accumulator.finish()
    }
}

/// Remove every matching row in the window, returning the number removed.
///
/// Matches are collected before the first removal and removed in descending
/// position order, so pending positions never shift and a failure while
/// collecting leaves the table untouched.
pub fn remove_matching<M: ColumnMutator + ?Sized>(
    mutator: &mut M,
    tree: &PredicateTree,
    base: Option<&[RowKey]>,
    window: &ResultWindow,
) -> QueryResult<usize> {
    let (mut positions, tracker) = {
        let accessor: &M = mutator;
        let mut executor = QueryExecutor::new(accessor, tree);
        if let Some(keys) = base {
            executor = executor.in_view(keys);
        }
        let tracker = executor.start("remove");
        (executor.matching_positions(window)?, tracker)
    };

    positions.sort_unstable_by(|a, b| b.cmp(a));
    positions.dedup();
    for &row in &positions {
        mutator.remove_row(row)?;
    }

    debug!(
        table = %mutator.table_name(),
        predicate = %tree,
        window = %window,
        removed = positions.len(),
        "Rows removed"
    );
    if let (Some(logger), Some(tracker)) = (mutator.slow_query_logger(), tracker) {
        logger.finish_query(tracker, positions.len());
    }

    Ok(positions.len())
}
