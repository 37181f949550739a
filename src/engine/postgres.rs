//! PostgreSQL engine.
//!
//! Index eligibility is toggled through `pg_index.indisvalid` and scan
//! fallback through the `enable_seqscan` session setting. Updating
//! `pg_index` needs superuser rights and outlives the session.
//!
//! `sqlx` is async; the engine drives one connection on a current-thread
//! Tokio runtime and blocks on each statement, so the benchmark stays
//! strictly sequential.

use futures::TryStreamExt;
use sqlx::{Connection, PgConnection};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::{Engine, RangeMatch};
use crate::catalog::DatasetRecord;
use crate::config::{CompositeIndex, TableName};
use crate::error::{BenchError, Result};

/// One PostgreSQL connection driven synchronously.
pub struct PostgresEngine {
    runtime: Runtime,
    conn: Option<PgConnection>,
}

fn live(conn: &mut Option<PgConnection>) -> Result<&mut PgConnection> {
    conn.as_mut().ok_or(BenchError::ConnectionClosed)
}

pub(crate) fn count_sql(table: &TableName) -> String {
    format!("SELECT COUNT(*) FROM {table} WHERE kpath ~ $1 AND kvalue BETWEEN $2 AND $3")
}

pub(crate) fn enumerate_sql(table: &TableName) -> String {
    format!("SELECT kpath, kvalue FROM {table} WHERE kpath ~ $1 AND kvalue BETWEEN $2 AND $3")
}

const SET_SEQSCAN: &str = "SELECT set_config('enable_seqscan', $1, false)";
const SHOW_SEQSCAN: &str = "SELECT current_setting('enable_seqscan')";
const SET_INDISVALID: &str =
    "UPDATE pg_index SET indisvalid = $1 WHERE indexrelid = $2::text::regclass";
const SHOW_INDISVALID: &str = "SELECT indisvalid FROM pg_index WHERE indexrelid = $1::text::regclass";
const INSERT_UNNEST: &str =
    "INSERT INTO {table} (kpath, kvalue, revision) SELECT * FROM UNNEST($1::text[], $2::int8[], $3::text[])";

impl PostgresEngine {
    /// Connects to `url` on a private current-thread runtime.
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let conn = runtime.block_on(PgConnection::connect(url))?;
        debug!("postgres connection established");
        Ok(Self {
            runtime,
            conn: Some(conn),
        })
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        let conn = live(&mut self.conn)?;
        self.runtime.block_on(sqlx::query(sql).execute(&mut *conn))?;
        Ok(())
    }
}

impl Engine for PostgresEngine {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn set_scan_fallback(&mut self, enabled: bool) -> Result<()> {
        let conn = live(&mut self.conn)?;
        let value = if enabled { "on" } else { "off" };
        self.runtime
            .block_on(sqlx::query(SET_SEQSCAN).bind(value).execute(&mut *conn))?;
        Ok(())
    }

    fn set_index_eligible(&mut self, index: &str, eligible: bool) -> Result<()> {
        let conn = live(&mut self.conn)?;
        let done = self.runtime.block_on(
            sqlx::query(SET_INDISVALID)
                .bind(eligible)
                .bind(index)
                .execute(&mut *conn),
        )?;
        if done.rows_affected() == 0 {
            return Err(BenchError::UnknownIndex(index.to_string()));
        }
        Ok(())
    }

    fn scan_fallback_setting(&mut self) -> Result<Option<String>> {
        let conn = live(&mut self.conn)?;
        let setting = self.runtime.block_on(
            sqlx::query_scalar::<_, String>(SHOW_SEQSCAN).fetch_optional(&mut *conn),
        )?;
        Ok(setting)
    }

    fn index_eligibility(&mut self, index: &str) -> Result<Option<String>> {
        let conn = live(&mut self.conn)?;
        let valid = self.runtime.block_on(
            sqlx::query_scalar::<_, bool>(SHOW_INDISVALID)
                .bind(index)
                .fetch_optional(&mut *conn),
        )?;
        Ok(valid.map(|v| if v { "t" } else { "f" }.to_string()))
    }

    fn count_matches(&mut self, table: &TableName, query: RangeMatch<'_>) -> Result<u64> {
        let conn = live(&mut self.conn)?;
        let sql = count_sql(table);
        let count = self.runtime.block_on(
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(query.matcher)
                .bind(query.low)
                .bind(query.high)
                .fetch_one(&mut *conn),
        )?;
        Ok(count as u64)
    }

    fn enumerate_matches(&mut self, table: &TableName, query: RangeMatch<'_>) -> Result<u64> {
        let conn = live(&mut self.conn)?;
        let sql = enumerate_sql(table);
        let count = self.runtime.block_on(async {
            let mut rows = sqlx::query(&sql)
                .bind(query.matcher)
                .bind(query.low)
                .bind(query.high)
                .fetch(&mut *conn);
            let mut count = 0u64;
            while rows.try_next().await?.is_some() {
                count += 1;
            }
            Ok::<_, sqlx::Error>(count)
        })?;
        Ok(count)
    }

    fn recreate_table(&mut self, table: &TableName) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {table}"))?;
        self.execute(&format!(
            "CREATE UNLOGGED TABLE {table} (kpath TEXT, kvalue BIGINT, revision TEXT)"
        ))
    }

    fn insert_records(&mut self, table: &TableName, records: &[DatasetRecord]) -> Result<u64> {
        let conn = live(&mut self.conn)?;
        let sql = INSERT_UNNEST.replace("{table}", table.as_str());
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        let values: Vec<i64> = records.iter().map(|r| r.value).collect();
        let revisions: Vec<&str> = records.iter().map(|r| r.revision.as_str()).collect();
        let done = self.runtime.block_on(
            sqlx::query(&sql)
                .bind(paths)
                .bind(values)
                .bind(revisions)
                .execute(&mut *conn),
        )?;
        Ok(done.rows_affected())
    }

    fn create_index(&mut self, table: &TableName, index: CompositeIndex) -> Result<()> {
        self.execute(&format!(
            "CREATE INDEX {name} ON {table} USING btree ({columns}) WITH (FILLFACTOR = 100)",
            name = index.index_name(table),
            columns = index.columns()
        ))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            self.runtime.block_on(conn.close())?;
            debug!("postgres connection closed");
        }
        Ok(())
    }
}
