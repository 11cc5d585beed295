// crates/shard-gate-config/src/config.rs
// ============================================================================
// Module: Shard Gate Configuration
// Description: Configuration loading and validation for Shard Gate.
// Purpose: Provide strict config parsing with hard limits and safe defaults.
// Dependencies: shard-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from an optional TOML file with strict size and
//! path limits. Resolution order: an explicit path, then the
//! `SHARD_GATE_CONFIG` environment variable, then `shard-gate.toml` in the
//! working directory. Explicit and environment paths must exist; a missing
//! default file yields built-in defaults. Every section has defaults, so an
//! empty file is valid.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use shard_gate_core::ConnectPolicy;
use shard_gate_core::DEFAULT_TABLE;
use shard_gate_core::SqlDialect;
use shard_gate_core::validate_table_name;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "shard-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SHARD_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum connection retries.
pub(crate) const MAX_CONNECT_RETRIES: u32 = 16;
/// Maximum connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 600_000;
/// Maximum statement timeout in milliseconds.
pub(crate) const MAX_STATEMENT_TIMEOUT_MS: u64 = 3_600_000;
/// Maximum benchmark worker count.
pub const MAX_CONCURRENCY: usize = 1024;
/// Maximum operations per benchmark phase.
pub const MAX_OPERATIONS: usize = 10_000_000;
/// Default inserts per benchmark run.
const DEFAULT_COUNT: usize = 1000;
/// Default reads per benchmark run.
const DEFAULT_READS: usize = 1000;
/// Default benchmark worker count.
const DEFAULT_CONCURRENCY: usize = 10;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Shard Gate tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardGateConfig {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Benchmark defaults.
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    /// Structured event output.
    #[serde(default)]
    pub events: EventsConfig,
    /// File the configuration was read from, if any (not serialized).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl ShardGateConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicitly requested file cannot be
    /// read, or when parsing or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env::var(CONFIG_ENV_VAR).ok();
        let Some(resolved) = resolve_path(path, env_path)? else {
            return Ok(Self::default());
        };
        validate_path(&resolved)?;
        let content = read_limited(&resolved, MAX_CONFIG_FILE_SIZE, "config file")?;
        let mut config = Self::from_toml(&content)?;
        config.source = Some(resolved);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()?;
        self.benchmark.validate()?;
        self.events.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Database driver selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// `PostgreSQL` servers addressed by host and port.
    #[default]
    Postgres,
    /// `SQLite` files addressed by the descriptor's database path.
    Sqlite,
}

impl DriverKind {
    /// Returns the SQL dialect spoken by the driver.
    #[must_use]
    pub const fn dialect(self) -> SqlDialect {
        match self {
            Self::Postgres => SqlDialect::Postgres,
            Self::Sqlite => SqlDialect::Sqlite,
        }
    }

    /// Returns a stable label for the driver.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Connection establishment settings.
///
/// # Invariants
/// - Absent timeouts mean "wait indefinitely".
/// - Retries apply to connection establishment only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver used for every shard.
    #[serde(default)]
    pub driver: DriverKind,
    /// Connect timeout in milliseconds.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Statement timeout in milliseconds (`SQLite`: busy timeout).
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
    /// Additional connection attempts after a failure.
    #[serde(default)]
    pub connect_retries: u32,
}

impl ConnectionConfig {
    /// Builds the connection policy described by this section.
    #[must_use]
    pub fn policy(&self) -> ConnectPolicy {
        ConnectPolicy {
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            statement_timeout: self.statement_timeout_ms.map(Duration::from_millis),
            connect_retries: self.connect_retries,
        }
    }

    /// Validates connection settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_optional_ms(
            "connection.connect_timeout_ms",
            self.connect_timeout_ms,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_optional_ms(
            "connection.statement_timeout_ms",
            self.statement_timeout_ms,
            MAX_STATEMENT_TIMEOUT_MS,
        )?;
        if self.connect_retries > MAX_CONNECT_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "connection.connect_retries must be at most {MAX_CONNECT_RETRIES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Benchmark
// ============================================================================

/// Benchmark defaults, overridable from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Insert operations.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Read operations.
    #[serde(default = "default_reads")]
    pub reads: usize,
    /// Worker count for both phases.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Table written and read by the benchmark.
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            reads: DEFAULT_READS,
            concurrency: DEFAULT_CONCURRENCY,
            table: default_table(),
        }
    }
}

impl BenchmarkConfig {
    /// Validates benchmark settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a count or the concurrency is
    /// out of range or the table name is not a valid identifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count > MAX_OPERATIONS || self.reads > MAX_OPERATIONS {
            return Err(ConfigError::Invalid(format!(
                "benchmark counts must be at most {MAX_OPERATIONS}"
            )));
        }
        if !(1 ..= MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::Invalid(format!(
                "benchmark.concurrency must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        validate_table_name(&self.table)
            .map_err(|err| ConfigError::Invalid(format!("benchmark.table: {err}")))
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Structured event destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSinkKind {
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    #[default]
    None,
}

/// Structured event output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Event destination.
    #[serde(default)]
    pub sink: EventSinkKind,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl EventsConfig {
    /// Validates event settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (EventSinkKind::File, None) => {
                Err(ConfigError::Invalid("events.path is required when sink = \"file\"".to_string()))
            }
            (EventSinkKind::File, Some(path)) => validate_path_string("events.path", path),
            (_, Some(_)) => Err(ConfigError::Invalid(
                "events.path is only valid when sink = \"file\"".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML or JSON parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// Returns `None` when nothing was requested and the default file is absent.
fn resolve_path(
    path: Option<&Path>,
    env_path: Option<String>,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(env_path) = env_path {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(Some(PathBuf::from(env_path)));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_NAME);
    Ok(default.is_file().then_some(default))
}

/// Validates a resolved path against length limits.
pub(crate) fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string field against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    validate_path(Path::new(trimmed))
        .map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))
}

/// Validates an optional, non-zero, bounded millisecond value.
fn validate_optional_ms(field: &str, value: Option<u64>, max: u64) -> Result<(), ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Invalid(format!("{field} must be greater than zero"))),
        Some(value) if value > max => {
            Err(ConfigError::Invalid(format!("{field} must be at most {max}")))
        }
        _ => Ok(()),
    }
}

/// Reads a UTF-8 file no larger than `limit` bytes.
pub(crate) fn read_limited(path: &Path, limit: usize, label: &str) -> Result<String, ConfigError> {
    let bytes = fs::read(path)
        .map_err(|err| ConfigError::Io(format!("{label} {}: {err}", path.display())))?;
    if bytes.len() > limit {
        return Err(ConfigError::Invalid(format!("{label} exceeds size limit")));
    }
    String::from_utf8(bytes).map_err(|_| ConfigError::Invalid(format!("{label} must be utf-8")))
}

/// Default insert count.
const fn default_count() -> usize {
    DEFAULT_COUNT
}

/// Default read count.
const fn default_reads() -> usize {
    DEFAULT_READS
}

/// Default worker count.
const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Default benchmark table.
fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}
