//! Query executors.
//!
//! Both variants compile the query pattern, bind it with the value range and
//! time one engine call. The counting variant times a `COUNT(*)` aggregate;
//! the enumerating variant times the row query plus draining its cursor.

use std::time::Instant;

use serde::Serialize;
use tracing::trace;

use crate::catalog::PathQuery;
use crate::config::{ExecutorKind, TableName};
use crate::engine::{Engine, RangeMatch};
use crate::error::Result;

/// Outcome of one query execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    /// Wall time of the measured section, in whole milliseconds.
    pub elapsed_ms: u64,
    /// Rows matched by the query.
    pub match_count: u64,
}

/// Runs a single benchmark query against an engine.
pub trait QueryExecutor {
    /// Which variant this is.
    fn kind(&self) -> ExecutorKind;

    /// Executes `query` once and measures it.
    fn execute(&self, engine: &mut dyn Engine, query: &PathQuery) -> Result<QueryResult>;
}

/// Counts matches with an aggregate.
#[derive(Debug, Clone)]
pub struct CountingExecutor {
    table: TableName,
}

impl CountingExecutor {
    /// Executor for queries on `table`.
    pub fn new(table: TableName) -> Self {
        Self { table }
    }
}

impl QueryExecutor for CountingExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Count
    }

    fn execute(&self, engine: &mut dyn Engine, query: &PathQuery) -> Result<QueryResult> {
        timed(query, |matcher| {
            engine.count_matches(&self.table, range(matcher, query))
        })
    }
}

/// Counts matches by fetching every matching row.
#[derive(Debug, Clone)]
pub struct EnumeratingExecutor {
    table: TableName,
}

impl EnumeratingExecutor {
    /// Executor for queries on `table`.
    pub fn new(table: TableName) -> Self {
        Self { table }
    }
}

impl QueryExecutor for EnumeratingExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Enumerate
    }

    fn execute(&self, engine: &mut dyn Engine, query: &PathQuery) -> Result<QueryResult> {
        timed(query, |matcher| {
            engine.enumerate_matches(&self.table, range(matcher, query))
        })
    }
}

/// Builds the executor variant named by `kind`.
pub fn executor_for(kind: ExecutorKind, table: TableName) -> Box<dyn QueryExecutor> {
    match kind {
        ExecutorKind::Count => Box::new(CountingExecutor::new(table)),
        ExecutorKind::Enumerate => Box::new(EnumeratingExecutor::new(table)),
    }
}

fn range<'a>(matcher: &'a str, query: &PathQuery) -> RangeMatch<'a> {
    RangeMatch {
        matcher,
        low: query.low,
        high: query.high,
    }
}

fn timed<F>(query: &PathQuery, run: F) -> Result<QueryResult>
where
    F: FnOnce(&str) -> Result<u64>,
{
    let matcher = query.matcher();
    let start = Instant::now();
    let match_count = run(&matcher)?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    trace!(query = %query, %matcher, match_count, elapsed_ms, "query executed");
    Ok(QueryResult {
        elapsed_ms,
        match_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DatasetRecord;
    use crate::config::CompositeIndex;
    use crate::engine::SqliteEngine;

    fn dataset() -> (SqliteEngine, TableName) {
        let table = TableName::new("cas").unwrap();
        let mut engine = SqliteEngine::open_in_memory().unwrap();
        engine.recreate_table(&table).unwrap();
        let records: Vec<DatasetRecord> = (0..50)
            .map(|i| DatasetRecord {
                path: format!("/src/mod{}/file{}.rs", i % 5, i),
                value: i,
                revision: format!("r{i}"),
            })
            .collect();
        engine.insert_records(&table, &records).unwrap();
        for index in CompositeIndex::ALL {
            engine.create_index(&table, index).unwrap();
        }
        (engine, table)
    }

    #[test]
    fn counting_and_enumerating_agree() {
        let (mut engine, table) = dataset();
        let counting = CountingExecutor::new(table.clone());
        let enumerating = EnumeratingExecutor::new(table);
        let queries = [
            ("/src/**", 0, 49, 50),
            ("/src/mod1/*", 0, 49, 10),
            ("/src/mod1/*", 10, 20, 2),
            ("/**/file7.rs", 0, 100, 1),
            ("/src/*/file3.rs", 0, 2, 0),
            ("/nothing", 0, 49, 0),
        ];
        for (pattern, low, high, expected) in queries {
            let query = PathQuery {
                pattern: pattern.into(),
                low,
                high,
            };
            let counted = counting.execute(&mut engine, &query).unwrap();
            let enumerated = enumerating.execute(&mut engine, &query).unwrap();
            assert_eq!(counted.match_count, expected, "{query}");
            assert_eq!(enumerated.match_count, expected, "{query}");
        }
    }

    #[test]
    fn executor_for_selects_variant() {
        let table = TableName::new("cas").unwrap();
        assert_eq!(
            executor_for(ExecutorKind::Count, table.clone()).kind(),
            ExecutorKind::Count
        );
        assert_eq!(
            executor_for(ExecutorKind::Enumerate, table).kind(),
            ExecutorKind::Enumerate
        );
    }
}
