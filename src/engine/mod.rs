//! Relational engines the benchmark runs against.
//!
//! The harness never plans or stores anything itself. Everything it needs
//! from the database is captured by [`Engine`]: session and index
//! administration, the two query shapes, and the table loader used by
//! `pathbench-prepare`.

use std::path::PathBuf;

use crate::catalog::DatasetRecord;
use crate::config::{CompositeIndex, TableName};
use crate::error::{BenchError, Result};

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresEngine;
pub use sqlite::SqliteEngine;

/// Bound parameters of one benchmark query.
#[derive(Debug, Clone, Copy)]
pub struct RangeMatch<'a> {
    /// Anchored matcher applied to `kpath`.
    pub matcher: &'a str,
    /// Inclusive lower bound on `kvalue`.
    pub low: i64,
    /// Inclusive upper bound on `kvalue`.
    pub high: i64,
}

/// Connection to an external relational engine.
///
/// Every call is a single synchronous round trip; implementations never
/// retry.
pub trait Engine {
    /// Short engine label for diagnostics.
    fn name(&self) -> &'static str;

    /// Allows or forbids full-table-scan plans for this session.
    fn set_scan_fallback(&mut self, enabled: bool) -> Result<()>;

    /// Marks `index` as usable or unusable by the planner.
    fn set_index_eligible(&mut self, index: &str, eligible: bool) -> Result<()>;

    /// Current scan-fallback setting as the engine reports it (`on`/`off`).
    fn scan_fallback_setting(&mut self) -> Result<Option<String>>;

    /// Current eligibility of `index` (`t`/`f`), `None` when no row exists.
    fn index_eligibility(&mut self, index: &str) -> Result<Option<String>>;

    /// Number of rows of `table` matching `query`, via a count aggregate.
    fn count_matches(&mut self, table: &TableName, query: RangeMatch<'_>) -> Result<u64>;

    /// Number of rows of `table` matching `query`, by draining a row cursor.
    fn enumerate_matches(&mut self, table: &TableName, query: RangeMatch<'_>) -> Result<u64>;

    /// Drops `table` if present and creates it empty.
    fn recreate_table(&mut self, table: &TableName) -> Result<()>;

    /// Appends `records` to `table`, returning the number of rows written.
    fn insert_records(&mut self, table: &TableName, records: &[DatasetRecord]) -> Result<u64>;

    /// Builds the composite `index` on `table`.
    fn create_index(&mut self, table: &TableName, index: CompositeIndex) -> Result<()>;

    /// Releases the connection; closing twice is a no-op.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Where to connect, parsed from a database URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineUrl {
    /// `postgres://...` or `postgresql://...`, passed to the driver verbatim.
    Postgres(String),
    /// `sqlite://<path>`.
    SqliteFile(PathBuf),
    /// `sqlite::memory:`.
    SqliteMemory,
}

impl EngineUrl {
    /// Picks the engine from the URL scheme.
    pub fn parse(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(EngineUrl::Postgres(url.to_string()))
        } else if url == "sqlite::memory:" {
            Ok(EngineUrl::SqliteMemory)
        } else if let Some(path) = url.strip_prefix("sqlite://").filter(|p| !p.is_empty()) {
            Ok(EngineUrl::SqliteFile(PathBuf::from(path)))
        } else {
            Err(BenchError::UnsupportedEngineUrl(url.to_string()))
        }
    }

    /// Opens a connection.
    pub fn connect(&self) -> Result<Box<dyn Engine>> {
        Ok(match self {
            EngineUrl::Postgres(url) => Box::new(PostgresEngine::connect(url)?),
            EngineUrl::SqliteFile(path) => Box::new(SqliteEngine::open(path)?),
            EngineUrl::SqliteMemory => Box::new(SqliteEngine::open_in_memory()?),
        })
    }
}
