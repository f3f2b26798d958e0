//! Structured logging with tracing
//!
//! Provides subscriber initialisation for binaries and slow operation
//! tracking for the query executor. The library itself only emits events.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::EngineSettings;

/// Maximum number of slow operations retained per table
const SLOW_QUERY_HISTORY: usize = 1000;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub level: String,

    /// Enable JSON format output
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Parse log level from string
    pub fn parse_level(&self) -> Level {
        match self.level.to_uppercase().as_str() {
            "ERROR" => Level::ERROR,
            "WARN" => Level::WARN,
            "INFO" => Level::INFO,
            "DEBUG" => Level::DEBUG,
            "TRACE" => Level::TRACE,
            _ => Level::INFO,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.parse_level().to_string()));

    let subscriber = Registry::default().with(env_filter);

    if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr);

        subscriber.with(json_layer).try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact();

        subscriber.with(fmt_layer).try_init()?;
    }

    tracing::debug!(
        "Logging initialized: level={}, json={}",
        config.level,
        config.json_format
    );

    Ok(())
}

/// Record of an executor operation that exceeded the threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowQuery {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub operation: String,
    pub table: String,
    pub rows_scanned: usize,
}

/// Slow operation logger shared by all handles of one table
#[derive(Debug, Clone)]
pub struct SlowQueryLogger {
    threshold: Duration,
    enabled: bool,
    queries: Arc<RwLock<Vec<SlowQuery>>>,
}

/// Timer for one executor operation
#[derive(Debug)]
pub struct QueryTracker {
    start_time: Instant,
    operation: &'static str,
    table: String,
}

impl SlowQueryLogger {
    /// Create a new slow query logger
    pub fn new(threshold: Duration, enabled: bool) -> Self {
        Self {
            threshold,
            enabled,
            queries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a logger from engine settings
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.slow_query_threshold_ms),
            settings.slow_query_logging,
        )
    }

    /// Start timing an operation
    pub fn start_query(&self, operation: &'static str, table: &str) -> QueryTracker {
        QueryTracker {
            start_time: Instant::now(),
            operation,
            table: table.to_string(),
        }
    }

    /// Finish timing an operation and record it if slow
    pub fn finish_query(&self, tracker: QueryTracker, rows_scanned: usize) {
        if !self.enabled {
            return;
        }

        let duration = tracker.start_time.elapsed();
        if duration < self.threshold {
            return;
        }

        let slow_query = SlowQuery {
            timestamp: Utc::now(),
            duration_ms: duration.as_millis() as u64,
            operation: tracker.operation.to_string(),
            table: tracker.table,
            rows_scanned,
        };

        tracing::warn!(
            target: "slow_query",
            duration_ms = slow_query.duration_ms,
            operation = %slow_query.operation,
            table = %slow_query.table,
            rows_scanned = slow_query.rows_scanned,
            "Slow query detected"
        );

        let mut queries = self.queries.write();
        queries.push(slow_query);
        if queries.len() > SLOW_QUERY_HISTORY {
            let len = queries.len();
            queries.drain(0..len - SLOW_QUERY_HISTORY);
        }
    }

    /// Recent slow operations, oldest first
    pub fn get_slow_queries(&self, limit: Option<usize>) -> Vec<SlowQuery> {
        let queries = self.queries.read();
        let limit = limit.unwrap_or(queries.len()).min(queries.len());
        queries[queries.len() - limit..].to_vec()
    }

    /// Forget all recorded slow operations
    pub fn clear(&self) {
        self.queries.write().clear();
    }
}

impl Default for SlowQueryLogger {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let mut config = LoggingConfig::default();
        assert_eq!(config.parse_level(), Level::INFO);
        config.level = "debug".into();
        assert_eq!(config.parse_level(), Level::DEBUG);
        config.level = "bogus".into();
        assert_eq!(config.parse_level(), Level::INFO);
    }

    #[test]
    fn test_slow_query_recorded_at_zero_threshold() {
        let logger = SlowQueryLogger::new(Duration::ZERO, true);
        let tracker = logger.start_query("count", "scores");
        logger.finish_query(tracker, 8);

        let slow = logger.get_slow_queries(None);
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].operation, "count");
        assert_eq!(slow[0].table, "scores");
        assert_eq!(slow[0].rows_scanned, 8);
    }

    #[test]
    fn test_disabled_logger_records_nothing() {
        let logger = SlowQueryLogger::new(Duration::ZERO, false);
        let tracker = logger.start_query("find_all", "scores");
        logger.finish_query(tracker, 8);
        assert!(logger.get_slow_queries(None).is_empty());
    }

    #[test]
    fn test_fast_queries_not_recorded() {
        let logger = SlowQueryLogger::new(Duration::from_secs(60), true);
        let tracker = logger.start_query("count", "scores");
        logger.finish_query(tracker, 8);
        assert!(logger.get_slow_queries(Some(5)).is_empty());
    }
}
