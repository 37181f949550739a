//! Query latency benchmark for a path/value store kept in a relational table.
//!
//! A catalog of path-pattern and value-range queries is run against a table
//! while exactly one of two composite B-tree indexes, `(kvalue, kpath)` or
//! `(kpath, kvalue)`, is eligible for planning. Per-query latency and match
//! counts are streamed to stdout, followed by run totals and averages.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod controller;
pub mod driver;
pub mod engine;
mod error;
pub mod executor;
pub mod loader;
pub mod pattern;
pub mod telemetry;

pub use catalog::{load_catalog, DatasetReader, DatasetRecord, PathQuery};
pub use config::{CompositeIndex, ExecutorKind, IndexSelection, Settings, TableName};
pub use driver::{Benchmark, Measurement, RunStatistics};
pub use engine::{Engine, EngineUrl};
pub use error::{BenchError, Result};
pub use executor::{executor_for, CountingExecutor, EnumeratingExecutor, QueryExecutor, QueryResult};
