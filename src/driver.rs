//! Benchmark driver.
//!
//! A [`Benchmark`] owns the catalog and every measurement of its run. The
//! console report it writes is consumed by analysis scripts, so its layout
//! is fixed:
//!
//! ```text
//! Configuration:            (index setup, see controller)
//! ...
//! Q0;<matches>;<ms>         (one line per query, streamed)
//! ...
//!                           (blank line after each repetition)
//! Configuration:            (after reset)
//! ...
//! Totals:
//! runtimeMs: <int>
//! runtimeS:  <float>
//! nrMatches: <int>
//!
//! Averages:
//! runtimeMs: <float>
//! runtimeS:  <float>
//! nrMatches: <float>
//!
//! ```

use std::io::{self, Write};
use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::PathQuery;
use crate::config::{IndexSelection, TableName};
use crate::controller::{report_failure, IndexSession};
use crate::engine::Engine;
use crate::error::Result;
use crate::executor::{QueryExecutor, QueryResult};

/// One collected result with its position in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// 0-based repetition.
    pub repetition: usize,
    /// 0-based index of the query within the catalog.
    pub query: usize,
    /// What the executor observed.
    pub result: QueryResult,
}

/// Aggregates over every measurement of a run.
///
/// Averages divide by the number of measurements; with none they are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunStatistics {
    /// Number of measurements aggregated.
    pub queries: usize,
    /// Sum of elapsed milliseconds.
    pub total_elapsed_ms: u64,
    /// Sum of elapsed time in seconds.
    pub total_elapsed_s: f64,
    /// Sum of match counts.
    pub total_matches: u64,
    /// Mean elapsed milliseconds per query.
    pub average_elapsed_ms: f64,
    /// Mean elapsed seconds per query.
    pub average_elapsed_s: f64,
    /// Mean match count per query.
    pub average_matches: f64,
}

impl RunStatistics {
    /// Sums and averages `results`.
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a QueryResult>,
    {
        let mut queries = 0usize;
        let mut total_elapsed_ms = 0u64;
        let mut total_matches = 0u64;
        for result in results {
            queries += 1;
            total_elapsed_ms += result.elapsed_ms;
            total_matches += result.match_count;
        }
        let total_elapsed_s = total_elapsed_ms as f64 / 1000.0;
        let n = queries as f64;
        Self {
            queries,
            total_elapsed_ms,
            total_elapsed_s,
            total_matches,
            average_elapsed_ms: total_elapsed_ms as f64 / n,
            average_elapsed_s: total_elapsed_s / n,
            average_matches: total_matches as f64 / n,
        }
    }

    /// Writes the totals and averages blocks.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Totals:")?;
        writeln!(out, "runtimeMs: {}", self.total_elapsed_ms)?;
        writeln!(out, "runtimeS:  {:.6}", self.total_elapsed_s)?;
        writeln!(out, "nrMatches: {}", self.total_matches)?;
        writeln!(out)?;
        writeln!(out, "Averages:")?;
        writeln!(out, "runtimeMs: {:.6}", self.average_elapsed_ms)?;
        writeln!(out, "runtimeS:  {:.6}", self.average_elapsed_s)?;
        writeln!(out, "nrMatches: {:.6}", self.average_matches)?;
        writeln!(out)?;
        out.flush()
    }
}

#[derive(Serialize)]
struct ExportRow<'a> {
    repetition: usize,
    query: usize,
    pattern: &'a str,
    low: i64,
    high: i64,
    match_count: u64,
    elapsed_ms: u64,
}

/// A benchmark over one catalog, table and index selection.
pub struct Benchmark {
    catalog: Vec<PathQuery>,
    table: TableName,
    selection: IndexSelection,
    repetitions: usize,
    warmup: bool,
    measurements: Vec<Measurement>,
}

impl Benchmark {
    /// Single-repetition benchmark without warm-up.
    pub fn new(catalog: Vec<PathQuery>, table: TableName, selection: IndexSelection) -> Self {
        Self {
            catalog,
            table,
            selection,
            repetitions: 1,
            warmup: false,
            measurements: Vec::new(),
        }
    }

    /// Sets how many times the whole catalog is executed.
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Runs the catalog once, unrecorded, before the measured repetitions.
    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// The catalog being benchmarked.
    pub fn catalog(&self) -> &[PathQuery] {
        &self.catalog
    }

    /// Measurements collected so far, in execution order.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Statistics over the collected measurements.
    pub fn statistics(&self) -> RunStatistics {
        RunStatistics::from_results(self.measurements.iter().map(|m| &m.result))
    }

    /// Connects, runs the benchmark and closes the connection.
    ///
    /// A failed connection is returned as is; nothing else is attempted.
    pub fn run<C, W>(
        &mut self,
        connect: C,
        executor: &dyn QueryExecutor,
        out: &mut W,
    ) -> Result<RunStatistics>
    where
        C: FnOnce() -> Result<Box<dyn Engine>>,
        W: Write,
    {
        let mut engine = connect()?;
        let outcome = self.run_on(engine.as_mut(), executor, out);
        report_failure("close connection", engine.close());
        outcome
    }

    /// Runs the benchmark on an open engine.
    ///
    /// Failing queries are logged and skipped. Index reset and the statistics
    /// report happen regardless; only console write errors abort the run.
    pub fn run_on<W: Write>(
        &mut self,
        engine: &mut dyn Engine,
        executor: &dyn QueryExecutor,
        out: &mut W,
    ) -> Result<RunStatistics> {
        self.measurements.clear();
        self.measurements
            .reserve(self.repetitions.saturating_mul(self.catalog.len()));
        info!(
            table = %self.table,
            queries = self.catalog.len(),
            repetitions = self.repetitions,
            executor = ?executor.kind(),
            "starting benchmark"
        );

        let mut session = IndexSession::configure(engine, &self.table, self.selection, out)?;
        if self.warmup {
            self.warm_up(session.engine(), executor);
        }
        for repetition in 0..self.repetitions {
            for (index, query) in self.catalog.iter().enumerate() {
                match executor.execute(session.engine(), query) {
                    Ok(result) => {
                        writeln!(out, "Q{};{};{}", index, result.match_count, result.elapsed_ms)?;
                        out.flush()?;
                        self.measurements.push(Measurement {
                            repetition,
                            query: index,
                            result,
                        });
                    }
                    Err(err) => report_failure(&format!("query Q{index} ({query})"), Err(err)),
                }
            }
            writeln!(out)?;
            debug!(repetition, "repetition finished");
        }
        session.reset(out)?;

        let stats = self.statistics();
        stats.write_report(out)?;
        info!(
            queries = stats.queries,
            total_ms = stats.total_elapsed_ms,
            "benchmark finished"
        );
        Ok(stats)
    }

    fn warm_up(&self, engine: &mut dyn Engine, executor: &dyn QueryExecutor) {
        info!(queries = self.catalog.len(), "warming up");
        for (index, query) in self.catalog.iter().enumerate() {
            match executor.execute(engine, query) {
                Ok(result) => debug!(index, ?result, "warm-up query"),
                Err(err) => report_failure(&format!("warm-up Q{index} ({query})"), Err(err)),
            }
        }
    }

    /// Writes every measurement to a `;`-separated CSV file with header.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let mut writer = WriterBuilder::new().delimiter(b';').from_path(path)?;
        for measurement in &self.measurements {
            let query = &self.catalog[measurement.query];
            writer.serialize(ExportRow {
                repetition: measurement.repetition,
                query: measurement.query,
                pattern: &query.pattern,
                low: query.low,
                high: query.high,
                match_count: measurement.result.match_count,
                elapsed_ms: measurement.result.elapsed_ms,
            })?;
        }
        writer.flush()?;
        debug!(path = %path.display(), rows = self.measurements.len(), "results exported");
        Ok(())
    }
}
