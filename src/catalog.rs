//! Query catalog and dataset readers.
//!
//! Both inputs are `;`-delimited text without header or quoting. A catalog
//! line is `<pattern>;<low>;<high>`, a dataset line is
//! `<path>;<value>[;<revision>]`.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::pattern;

/// One benchmark case: a path pattern and an inclusive value range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    /// Path pattern in the glob dialect of [`crate::pattern`].
    pub pattern: String,
    /// Lower bound of the value range.
    pub low: i64,
    /// Upper bound of the value range.
    pub high: i64,
}

impl PathQuery {
    /// Matcher expression for this query's pattern.
    pub fn matcher(&self) -> String {
        pattern::compile(&self.pattern)
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{}", self.pattern, self.low, self.high)
    }
}

/// A `(path, value, revision)` row of the benchmarked table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    /// Hierarchical key path.
    pub path: String,
    /// Numeric value stored under the path.
    pub value: i64,
    /// Revision identifier, empty when the source omits it.
    pub revision: String,
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .quoting(false);
    builder
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

fn parse_int(field: &str, line: u64, what: &str) -> Result<i64> {
    field
        .parse::<i64>()
        .map_err(|err| BenchError::format(line, format!("{what} '{field}': {err}")))
}

/// Loads the query catalog at `path`, preserving file order.
pub fn load_catalog(path: &Path) -> Result<Vec<PathQuery>> {
    let file = File::open(path)?;
    let queries = read_catalog(BufReader::new(file))?;
    debug!(path = %path.display(), queries = queries.len(), "catalog loaded");
    Ok(queries)
}

/// Parses catalog records from `reader`.
///
/// Any malformed record fails the whole load; bounds are not checked
/// against each other.
pub fn read_catalog<R: Read>(reader: R) -> Result<Vec<PathQuery>> {
    let mut rdr = reader_builder().from_reader(reader);
    let mut queries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = line_of(&record);
        if record.len() != 3 {
            return Err(BenchError::format(
                line,
                format!("expected 3 fields <pattern>;<low>;<high>, found {}", record.len()),
            ));
        }
        queries.push(PathQuery {
            pattern: record[0].to_string(),
            low: parse_int(&record[1], line, "low bound")?,
            high: parse_int(&record[2], line, "high bound")?,
        });
    }
    Ok(queries)
}

/// Streaming reader over dataset records.
pub struct DatasetReader<R: Read> {
    inner: csv::Reader<R>,
    record: StringRecord,
}

impl DatasetReader<Box<dyn Read>> {
    /// Opens a dataset file.
    ///
    /// With a non-zero `limit_bytes` only the prefix up to and including the
    /// first newline at or after that offset is read, so rows are never cut.
    pub fn open(path: &Path, limit_bytes: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        let source: Box<dyn Read> = if limit_bytes == 0 || limit_bytes >= size {
            Box::new(BufReader::new(file))
        } else {
            let prefix = prefix_len(&mut file, limit_bytes, size)?;
            file.seek(SeekFrom::Start(0))?;
            Box::new(BufReader::new(file).take(prefix))
        };
        Ok(Self::new(source))
    }
}

impl<R: Read> DatasetReader<R> {
    /// Wraps an arbitrary byte source.
    pub fn new(reader: R) -> Self {
        Self {
            inner: reader_builder().from_reader(reader),
            record: StringRecord::new(),
        }
    }

    /// Reads up to `max` records into `batch`, returning how many were read.
    pub fn next_batch(&mut self, batch: &mut Vec<DatasetRecord>, max: usize) -> Result<usize> {
        batch.clear();
        while batch.len() < max {
            if !self.inner.read_record(&mut self.record)? {
                break;
            }
            let line = line_of(&self.record);
            if self.record.len() < 2 || self.record.len() > 3 {
                return Err(BenchError::format(
                    line,
                    format!(
                        "expected <path>;<value>[;<revision>], found {} fields",
                        self.record.len()
                    ),
                ));
            }
            batch.push(DatasetRecord {
                path: self.record[0].to_string(),
                value: parse_int(&self.record[1], line, "value")?,
                revision: self.record.get(2).unwrap_or_default().to_string(),
            });
        }
        Ok(batch.len())
    }
}

fn prefix_len(file: &mut File, limit: u64, size: u64) -> io::Result<u64> {
    file.seek(SeekFrom::Start(limit))?;
    let mut tail = Vec::new();
    BufReader::new(&mut *file).read_until(b'\n', &mut tail)?;
    Ok((limit + tail.len() as u64).min(size))
}
