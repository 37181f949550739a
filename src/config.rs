//! Run configuration: index selection, table names and the settings file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

use crate::error::{BenchError, Result};

/// Default connection string when neither flags nor the config file name one.
pub const DEFAULT_DATABASE_URL: &str = "postgres://wellenzohn@localhost:5400/rcas";

/// Composite index orderings that can be benchmarked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeIndex {
    /// `(kvalue, kpath)` ordering.
    ValuePath,
    /// `(kpath, kvalue)` ordering.
    PathValue,
}

impl CompositeIndex {
    /// Both orderings, in the order the loader builds them.
    pub const ALL: [CompositeIndex; 2] = [CompositeIndex::PathValue, CompositeIndex::ValuePath];

    /// Selector token used on the command line and in index names.
    pub fn suffix(self) -> &'static str {
        match self {
            CompositeIndex::ValuePath => "vp",
            CompositeIndex::PathValue => "pv",
        }
    }

    /// Index column list, most significant first.
    pub fn columns(self) -> &'static str {
        match self {
            CompositeIndex::ValuePath => "kvalue, kpath",
            CompositeIndex::PathValue => "kpath, kvalue",
        }
    }

    /// Name of this index on `table`.
    pub fn index_name(self, table: &TableName) -> String {
        format!("{}_idx_{}", table.as_str(), self.suffix())
    }
}

impl FromStr for CompositeIndex {
    type Err = BenchError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "vp" => Ok(CompositeIndex::ValuePath),
            "pv" => Ok(CompositeIndex::PathValue),
            other => Err(BenchError::InvalidCompositeIndex(other.to_string())),
        }
    }
}

impl fmt::Display for CompositeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Which of the two composite indexes the planner may use during a run.
///
/// Built from a single [`CompositeIndex`], so exactly one flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSelection {
    use_value_path: bool,
    use_path_value: bool,
}

impl IndexSelection {
    /// Selection enabling only `index`.
    pub fn only(index: CompositeIndex) -> Self {
        Self {
            use_value_path: index == CompositeIndex::ValuePath,
            use_path_value: index == CompositeIndex::PathValue,
        }
    }

    /// Whether the value-then-path index is eligible.
    pub fn use_value_path(&self) -> bool {
        self.use_value_path
    }

    /// Whether the path-then-value index is eligible.
    pub fn use_path_value(&self) -> bool {
        self.use_path_value
    }

    /// Eligibility of `index` under this selection.
    pub fn enables(&self, index: CompositeIndex) -> bool {
        match index {
            CompositeIndex::ValuePath => self.use_value_path,
            CompositeIndex::PathValue => self.use_path_value,
        }
    }
}

impl From<CompositeIndex> for IndexSelection {
    fn from(index: CompositeIndex) -> Self {
        IndexSelection::only(index)
    }
}

/// A table name safe to splice into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// Validates `name` as a bare identifier.
    pub fn new(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(BenchError::InvalidTable(name.to_string()))
        }
    }

    /// The validated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TableName {
    type Err = BenchError;

    fn from_str(value: &str) -> Result<Self> {
        TableName::new(value)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Executor variant used for the measured queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    /// `SELECT COUNT(*)`, one scalar per query.
    #[default]
    Count,
    /// Row-returning query whose cursor is drained.
    Enumerate,
}

/// Settings resolved from the config file; flags override each field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    run: RunSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RunSection {
    repetitions: Option<usize>,
    executor: Option<ExecutorKind>,
    warmup: Option<bool>,
}

impl Settings {
    /// Loads settings from `explicit`, or the default location when `None`.
    ///
    /// A missing file yields the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(default_config_path);
        match path {
            Some(path) if path.exists() => read_file(&path),
            Some(path) if explicit.is_some() => Err(ConfigError::Missing { path }),
            _ => Ok(Settings::default()),
        }
    }

    /// Parses settings from TOML text.
    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Database URL, falling back to [`DEFAULT_DATABASE_URL`].
    pub fn database_url(&self) -> &str {
        self.database.url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }

    /// Number of measured repetitions over the catalog.
    pub fn repetitions(&self) -> usize {
        self.run.repetitions.unwrap_or(1)
    }

    /// Executor variant.
    pub fn executor(&self) -> ExecutorKind {
        self.run.executor.unwrap_or_default()
    }

    /// Whether to run an unrecorded warm-up pass.
    pub fn warmup(&self) -> bool {
        self.run.warmup.unwrap_or(false)
    }

    /// Applies command-line overrides.
    pub fn override_with(
        mut self,
        url: Option<String>,
        repetitions: Option<usize>,
        executor: Option<ExecutorKind>,
        warmup: bool,
    ) -> Self {
        if url.is_some() {
            self.database.url = url;
        }
        if repetitions.is_some() {
            self.run.repetitions = repetitions;
        }
        if executor.is_some() {
            self.run.executor = executor;
        }
        if warmup {
            self.run.warmup = Some(true);
        }
        self
    }
}

fn read_file(path: &Path) -> std::result::Result<Settings, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Settings::from_toml(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `$XDG_CONFIG_HOME/pathbench/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("pathbench").join("config.toml"))
}

/// Errors from the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file location.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`Settings`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file location.
        path: PathBuf,
        /// Parser diagnostic.
        source: toml::de::Error,
    },
    /// An explicitly requested file does not exist.
    #[error("config file {path} does not exist")]
    Missing {
        /// Requested location.
        path: PathBuf,
    },
}
