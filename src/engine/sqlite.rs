//! Embedded SQLite engine.
//!
//! SQLite has no planner switches, so the administrative state is kept on the
//! connection: while scan fallback is off and exactly one composite index of
//! a table is eligible, queries on that table carry `INDEXED BY <index>`.
//! Matching uses a `regexp()` function backed by the `regex` crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{Engine, RangeMatch};
use crate::catalog::DatasetRecord;
use crate::config::{CompositeIndex, TableName};
use crate::error::{BenchError, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One SQLite connection plus the emulated planner settings.
pub struct SqliteEngine {
    conn: Connection,
    scan_fallback: bool,
    eligibility: HashMap<String, bool>,
}

impl SqliteEngine {
    /// Opens or creates the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        register_regexp(&conn)?;
        Ok(Self {
            conn,
            scan_fallback: true,
            eligibility: HashMap::new(),
        })
    }

    fn index_exists(&self, index: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [index],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn eligible(&self, index: &str) -> bool {
        self.eligibility.get(index).copied().unwrap_or(true)
    }

    fn index_hint(&self, table: &TableName) -> String {
        if self.scan_fallback {
            return String::new();
        }
        let eligible: Vec<String> = CompositeIndex::ALL
            .iter()
            .map(|index| index.index_name(table))
            .filter(|name| self.eligibility.contains_key(name) && self.eligible(name))
            .collect();
        match eligible.as_slice() {
            [only] => format!(" INDEXED BY {only}"),
            _ => String::new(),
        }
    }

    fn match_sql(&self, table: &TableName, projection: &str) -> String {
        format!(
            "SELECT {projection} FROM {table}{hint} WHERE kpath REGEXP ?1 AND kvalue BETWEEN ?2 AND ?3",
            hint = self.index_hint(table)
        )
    }
}

fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let matcher: Arc<Regex> =
                ctx.get_or_create_aux(0, |raw| -> std::result::Result<_, BoxError> {
                    Ok(Regex::new(raw.as_str()?)?)
                })?;
            let path = match ctx.get_raw(1) {
                ValueRef::Null => return Ok(false),
                raw => raw
                    .as_str()
                    .map_err(|err| rusqlite::Error::UserFunctionError(err.into()))?,
            };
            Ok(matcher.is_match(path))
        },
    )?;
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

impl Engine for SqliteEngine {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn set_scan_fallback(&mut self, enabled: bool) -> Result<()> {
        self.scan_fallback = enabled;
        Ok(())
    }

    fn set_index_eligible(&mut self, index: &str, eligible: bool) -> Result<()> {
        if !self.index_exists(index)? {
            return Err(BenchError::UnknownIndex(index.to_string()));
        }
        self.eligibility.insert(index.to_string(), eligible);
        Ok(())
    }

    fn scan_fallback_setting(&mut self) -> Result<Option<String>> {
        Ok(Some(on_off(self.scan_fallback).to_string()))
    }

    fn index_eligibility(&mut self, index: &str) -> Result<Option<String>> {
        if !self.index_exists(index)? {
            return Ok(None);
        }
        let flag = if self.eligible(index) { "t" } else { "f" };
        Ok(Some(flag.to_string()))
    }

    fn count_matches(&mut self, table: &TableName, query: RangeMatch<'_>) -> Result<u64> {
        let sql = self.match_sql(table, "COUNT(*)");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let count: i64 = stmt.query_row(params![query.matcher, query.low, query.high], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }

    fn enumerate_matches(&mut self, table: &TableName, query: RangeMatch<'_>) -> Result<u64> {
        let sql = self.match_sql(table, "kpath, kvalue");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params![query.matcher, query.low, query.high])?;
        let mut count = 0u64;
        while rows.next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn recreate_table(&mut self, table: &TableName) -> Result<()> {
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                kpath TEXT,
                kvalue BIGINT,
                revision TEXT
             );"
        ))?;
        self.eligibility
            .retain(|name, _| !name.starts_with(&format!("{table}_idx_")));
        Ok(())
    }

    fn insert_records(&mut self, table: &TableName, records: &[DatasetRecord]) -> Result<u64> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {table} (kpath, kvalue, revision) VALUES (?1, ?2, ?3)"
            ))?;
            for record in records {
                stmt.execute(params![record.path, record.value, record.revision])?;
            }
        }
        tx.commit()?;
        debug!(table = %table, rows = records.len(), "sqlite batch inserted");
        Ok(records.len() as u64)
    }

    fn create_index(&mut self, table: &TableName, index: CompositeIndex) -> Result<()> {
        self.conn.execute(
            &format!(
                "CREATE INDEX {name} ON {table} ({columns})",
                name = index.index_name(table),
                columns = index.columns()
            ),
            [],
        )?;
        Ok(())
    }
}
