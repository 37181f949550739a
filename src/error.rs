use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used across the harness.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors raised while preparing, running or reporting a benchmark.
#[derive(Debug, Error)]
pub enum BenchError {
    /// I/O error while reading inputs or writing reports.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A catalog or dataset record could not be parsed.
    #[error("format error on line {line}: {reason}")]
    Format {
        /// 1-based line number of the offending record.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },
    /// Composite index selector outside `{vp,pv}`.
    #[error("composite index must be one of {{vp,pv}}, got '{0}'")]
    InvalidCompositeIndex(String),
    /// Table name that cannot be used as a bare SQL identifier.
    #[error("invalid table name '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidTable(String),
    /// Database URL whose scheme names no supported engine.
    #[error("unsupported database url '{0}': expected postgres:// or sqlite://")]
    UnsupportedEngineUrl(String),
    /// Administrative statement named an index the engine does not have.
    #[error("index '{0}' does not exist")]
    UnknownIndex(String),
    /// Operation attempted on a connection that was already closed.
    #[error("connection already closed")]
    ConnectionClosed,
    /// Error reported by the embedded SQLite engine.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Error reported by the PostgreSQL engine or its driver.
    #[error("postgres: {0}")]
    Postgres(#[from] sqlx::Error),
    /// A compiled matcher was rejected by the regex engine.
    #[error("invalid matcher: {0}")]
    Regex(#[from] regex::Error),
    /// CSV export failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Configuration file or value error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BenchError {
    pub(crate) fn format(line: u64, reason: impl Into<String>) -> Self {
        BenchError::Format {
            line,
            reason: reason.into(),
        }
    }
}
