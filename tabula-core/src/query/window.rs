//! Result windows bounding executor operations

use crate::error::{QueryError, QueryResult};
use std::fmt;
use std::ops::Range;

/// Row sub-range and match limit for one executor operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultWindow {
    start: usize,
    /// Exclusive; None means the end of the scanned rows
    end: Option<usize>,
    /// None means unlimited
    limit: Option<usize>,
}

impl ResultWindow {
    /// Every row, no limit
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a window, failing if `start > end`
    pub fn new(start: usize, end: Option<usize>, limit: Option<usize>) -> QueryResult<Self> {
        if let Some(end) = end {
            if start > end {
                return Err(QueryError::InvalidWindow(format!(
                    "start {} is past end {}",
                    start, end
                )));
            }
        }
        Ok(Self { start, end, limit })
    }

    /// Rows from `start` to the end
    pub fn from(start: usize) -> Self {
        Self {
            start,
            end: None,
            limit: None,
        }
    }

    /// Rows in `start..end`
    pub fn range(start: usize, end: usize) -> QueryResult<Self> {
        Self::new(start, Some(end), None)
    }

    /// Every row, at most `limit` matches
    pub fn limit(limit: usize) -> Self {
        Self {
            start: 0,
            end: None,
            limit: Some(limit),
        }
    }

    /// Build a window from signed bounds where `-1` means unbounded
    pub fn from_bounds(start: i64, end: i64, limit: i64) -> QueryResult<Self> {
        let start = usize::try_from(start)
            .map_err(|_| QueryError::InvalidWindow(format!("negative start {}", start)))?;
        let end = match end {
            -1 => None,
            e if e < 0 => {
                return Err(QueryError::InvalidWindow(format!("negative end {}", e)));
            }
            e => Some(e as usize),
        };
        let limit = match limit {
            -1 => None,
            l if l < 0 => {
                return Err(QueryError::InvalidWindow(format!("negative limit {}", l)));
            }
            l => Some(l as usize),
        };
        Self::new(start, end, limit)
    }

    /// Replace the match limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    pub fn max_matches(&self) -> Option<usize> {
        self.limit
    }

    /// Check if the window can never produce a match
    pub fn is_empty(&self) -> bool {
        self.limit == Some(0) || self.end == Some(self.start)
    }

    /// Shrink the bounds to fit `size` scanned rows, keeping the limit
    pub fn clamp(&self, size: usize) -> Self {
        Self {
            start: self.start.min(size),
            end: self.end.map(|end| end.min(size)),
            limit: self.limit,
        }
    }

    /// Resolve the window against the number of scanned rows
    pub fn resolve(&self, size: usize) -> QueryResult<Range<usize>> {
        if self.start > size {
            return Err(QueryError::RowOutOfRange {
                index: self.start,
                count: size,
            });
        }
        let end = match self.end {
            Some(end) if end > size => {
                return Err(QueryError::RowOutOfRange {
                    index: end,
                    count: size,
                });
            }
            Some(end) => end,
            None => size,
        };
        Ok(self.start..end)
    }
}

impl fmt::Display for ResultWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..", self.start)?;
        if let Some(end) = self.end {
            write!(f, "{}", end)?;
        }
        write!(f, ")")?;
        if let Some(limit) = self.limit {
            write!(f, " limit {}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(ResultWindow::all().resolve(8).unwrap(), 0..8);
        assert_eq!(ResultWindow::from(3).resolve(8).unwrap(), 3..8);
        assert_eq!(ResultWindow::from(8).resolve(8).unwrap(), 8..8);
        assert_eq!(ResultWindow::range(2, 5).unwrap().resolve(8).unwrap(), 2..5);
        assert!(matches!(
            ResultWindow::from(9).resolve(8),
            Err(QueryError::RowOutOfRange { index: 9, count: 8 })
        ));
        assert!(matches!(
            ResultWindow::range(0, 9).unwrap().resolve(8),
            Err(QueryError::RowOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn test_clamp() {
        let window = ResultWindow::range(2, 6).unwrap().with_limit(3);
        assert_eq!(window.clamp(8), window);
        let clamped = window.clamp(4);
        assert_eq!(clamped.resolve(4).unwrap(), 2..4);
        assert_eq!(clamped.max_matches(), Some(3));
        assert_eq!(ResultWindow::from(5).clamp(1).resolve(1).unwrap(), 1..1);
    }

    #[test]
    fn test_invalid_windows() {
        assert!(matches!(
            ResultWindow::range(5, 2),
            Err(QueryError::InvalidWindow(_))
        ));
        assert!(ResultWindow::from_bounds(-2, -1, -1).is_err());
        assert!(ResultWindow::from_bounds(0, -3, -1).is_err());
        assert!(ResultWindow::from_bounds(0, -1, -5).is_err());
        assert!(ResultWindow::from_bounds(4, 2, -1).is_err());
    }

    #[test]
    fn test_from_bounds_sentinels() {
        let window = ResultWindow::from_bounds(2, -1, -1).unwrap();
        assert_eq!(window, ResultWindow::from(2));
        let window = ResultWindow::from_bounds(0, 4, 1).unwrap();
        assert_eq!(window.end(), Some(4));
        assert_eq!(window.max_matches(), Some(1));
    }

    #[test]
    fn test_empty_windows() {
        assert!(ResultWindow::limit(0).is_empty());
        assert!(ResultWindow::range(3, 3).unwrap().is_empty());
        assert!(!ResultWindow::all().is_empty());
        assert_eq!(
            ResultWindow::range(1, 4).unwrap().with_limit(2).to_string(),
            "[1..4) limit 2"
        );
    }
}
