//! Index configuration for the duration of a run.
//!
//! [`IndexSession::configure`] disables scan fallback and leaves exactly the
//! selected composite index eligible. The session must be closed with
//! [`IndexSession::reset`]; if it is dropped first (early return, panic) the
//! drop handler still attempts the reset, without the console report.
//!
//! Statement failures are logged and do not stop the remaining statements.

use std::error::Error as _;
use std::io::{self, Write};

use tracing::{error, info, warn};

use crate::config::{CompositeIndex, IndexSelection, TableName};
use crate::engine::Engine;
use crate::error::BenchError;

/// Label under which the scan-fallback setting is reported.
pub const SCAN_FALLBACK_LABEL: &str = "enable_seqscan";

/// Report order of the two indexes.
const REPORT_ORDER: [CompositeIndex; 2] = [CompositeIndex::ValuePath, CompositeIndex::PathValue];

/// An engine whose index configuration has been changed for a run.
pub struct IndexSession<'e> {
    engine: &'e mut dyn Engine,
    table: TableName,
    pending_reset: bool,
}

impl<'e> IndexSession<'e> {
    /// Applies `selection` to `table` and prints the resulting configuration.
    ///
    /// Only a failure to write the report is returned as an error.
    pub fn configure<W: Write>(
        engine: &'e mut dyn Engine,
        table: &TableName,
        selection: IndexSelection,
        out: &mut W,
    ) -> io::Result<Self> {
        info!(engine = engine.name(), table = %table, ?selection, "configuring indexes");
        report_failure("disable scan fallback", engine.set_scan_fallback(false));
        for index in REPORT_ORDER {
            let name = index.index_name(table);
            let eligible = selection.enables(index);
            report_failure(
                &format!("set {name} eligible={eligible}"),
                engine.set_index_eligible(&name, eligible),
            );
        }
        let mut session = Self {
            engine,
            table: table.clone(),
            pending_reset: true,
        };
        print_configuration(&mut *session.engine, &session.table, out)?;
        Ok(session)
    }

    /// The configured engine.
    pub fn engine(&mut self) -> &mut dyn Engine {
        &mut *self.engine
    }

    /// Re-enables both indexes and scan fallback, then prints the result.
    pub fn reset<W: Write>(mut self, out: &mut W) -> io::Result<()> {
        self.pending_reset = false;
        restore(&mut *self.engine, &self.table);
        print_configuration(&mut *self.engine, &self.table, out)
    }
}

impl Drop for IndexSession<'_> {
    fn drop(&mut self) {
        if self.pending_reset {
            warn!(table = %self.table, "run ended before reset; restoring index configuration");
            restore(&mut *self.engine, &self.table);
        }
    }
}

fn restore(engine: &mut dyn Engine, table: &TableName) {
    info!(engine = engine.name(), table = %table, "resetting indexes");
    for index in REPORT_ORDER.iter().rev() {
        let name = index.index_name(table);
        report_failure(
            &format!("set {name} eligible=true"),
            engine.set_index_eligible(&name, true),
        );
    }
    report_failure("enable scan fallback", engine.set_scan_fallback(true));
}

/// Logs a failed administrative or query statement with its error chain.
pub(crate) fn report_failure(context: &str, outcome: Result<(), BenchError>) {
    if let Err(err) = outcome {
        let mut chain = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        error!(error = %chain, "{context} failed");
    }
}

/// Prints scan-fallback and index eligibility as the engine reports them.
///
/// Values the engine cannot produce are left out; a failing lookup is logged.
pub fn print_configuration<W: Write>(
    engine: &mut dyn Engine,
    table: &TableName,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "Configuration:")?;
    match engine.scan_fallback_setting() {
        Ok(Some(value)) => writeln!(out, "{SCAN_FALLBACK_LABEL}: {value}")?,
        Ok(None) => {}
        Err(err) => report_failure("read scan fallback", Err(err)),
    }
    for index in REPORT_ORDER {
        let name = index.index_name(table);
        match engine.index_eligibility(&name) {
            Ok(Some(value)) => writeln!(out, "{name} indisvalid: {value}")?,
            Ok(None) => {}
            Err(err) => report_failure(&format!("read {name} eligibility"), Err(err)),
        }
    }
    writeln!(out)?;
    out.flush()
}
