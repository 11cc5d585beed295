// crates/shard-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Shard Store
// Description: ConnectionFactory and ShardConnection backed by `rusqlite`.
// Purpose: Execute coordinator and benchmark SQL against SQLite shard files.
// Dependencies: rusqlite, shard-gate-core
// ============================================================================

//! ## Overview
//! Connections open the shard file read-write (creating it if needed), set a
//! busy timeout, and enable WAL journaling so concurrent benchmark workers
//! can share a file. Relative database paths resolve against an optional
//! base directory, typically the directory holding the mapping file.
//!
//! `SQLite` has no server-side statement timeout; the policy's statement
//! timeout is used as the busy timeout instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use rusqlite::types::ValueRef;
use shard_gate_core::ConnectPolicy;
use shard_gate_core::ConnectionFactory;
use shard_gate_core::ShardConnection;
use shard_gate_core::ShardDbError;
use shard_gate_core::ShardDescriptor;
use shard_gate_core::ShardKey;
use shard_gate_core::ShardRow;
use shard_gate_core::SqlDialect;
use shard_gate_core::SqlParam;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Busy timeout used when the policy does not set a statement timeout.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Opens one `SQLite` connection per request.
#[derive(Debug, Clone, Default)]
pub struct SqliteShardFactory {
    /// Directory that relative database paths resolve against.
    base_dir: Option<PathBuf>,
}

impl SqliteShardFactory {
    /// Creates a factory resolving relative paths against the working directory.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base_dir: None,
        }
    }

    /// Resolves relative database paths against `base_dir`.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Returns the database file for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Connect`] when the descriptor has no database.
    pub fn database_path(
        &self,
        key: ShardKey,
        descriptor: &ShardDescriptor,
    ) -> Result<PathBuf, ShardDbError> {
        let database = descriptor
            .database
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                ShardDbError::Connect(format!("shard {key} has no Database path for sqlite"))
            })?;
        let path = Path::new(database.trim());
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl ConnectionFactory for SqliteShardFactory {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn connect(
        &self,
        key: ShardKey,
        descriptor: &ShardDescriptor,
        policy: &ConnectPolicy,
    ) -> Result<Box<dyn ShardConnection>, ShardDbError> {
        let path = self.database_path(key, descriptor)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(&path, flags)
            .map_err(|err| ShardDbError::Connect(format!("{}: {err}", path.display())))?;
        let busy_timeout =
            policy.statement_timeout.unwrap_or(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));
        apply_pragmas(&connection, busy_timeout)?;
        Ok(Box::new(SqliteShardConnection {
            connection,
        }))
    }
}

/// Applies connection pragmas.
fn apply_pragmas(connection: &Connection, busy_timeout: Duration) -> Result<(), ShardDbError> {
    connection.busy_timeout(busy_timeout).map_err(|err| ShardDbError::Connect(err.to_string()))?;
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| ShardDbError::Connect(err.to_string()))?;
    connection
        .execute_batch("PRAGMA journal_mode = wal;")
        .map_err(|err| ShardDbError::Connect(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// One open `SQLite` session.
struct SqliteShardConnection {
    /// Underlying connection.
    connection: Connection,
}

/// Converts typed parameters into owned driver values.
fn bind(params: &[SqlParam]) -> Vec<Value> {
    params
        .iter()
        .map(|param| match param {
            SqlParam::Text(value) => Value::Text(value.clone()),
            SqlParam::Uuid(value) => Value::Text(value.hyphenated().to_string()),
        })
        .collect()
}

/// Renders a column value as optional text.
fn render_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(number) => Some(number.to_string()),
        ValueRef::Real(number) => Some(number.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl ShardConnection for SqliteShardConnection {
    fn begin(&mut self) -> Result<(), ShardDbError> {
        self.connection.execute_batch("BEGIN").map_err(|err| ShardDbError::Execute(err.to_string()))
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), ShardDbError> {
        self.connection.execute_batch(sql).map_err(|err| ShardDbError::Execute(err.to_string()))
    }

    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ShardDbError> {
        let changed = self
            .connection
            .execute(sql, params_from_iter(bind(params)))
            .map_err(|err| ShardDbError::Execute(err.to_string()))?;
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    fn query_opt(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<ShardRow>, ShardDbError> {
        let mut statement =
            self.connection.prepare(sql).map_err(|err| ShardDbError::Query(err.to_string()))?;
        let column_count = statement.column_count();
        statement
            .query_row(params_from_iter(bind(params)), |row| {
                let mut columns = Vec::with_capacity(column_count);
                for index in 0 .. column_count {
                    columns.push(render_value(row.get_ref(index)?));
                }
                Ok(ShardRow {
                    columns,
                })
            })
            .optional()
            .map_err(|err| ShardDbError::Query(err.to_string()))
    }

    fn commit(&mut self) -> Result<(), ShardDbError> {
        self.connection.execute_batch("COMMIT").map_err(|err| ShardDbError::Commit(err.to_string()))
    }

    fn rollback(&mut self) -> Result<(), ShardDbError> {
        self.connection
            .execute_batch("ROLLBACK")
            .map_err(|err| ShardDbError::Rollback(err.to_string()))
    }

    fn close(self: Box<Self>) -> Result<(), ShardDbError> {
        self.connection.close().map_err(|(_, err)| ShardDbError::Close(err.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests unwrap known-good fixtures.")]
mod tests {
    use std::path::PathBuf;

    use rusqlite::types::ValueRef;
    use shard_gate_core::ShardDescriptor;
    use shard_gate_core::ShardKey;

    use super::SqliteShardFactory;
    use super::render_value;

    fn descriptor(database: Option<&str>) -> ShardDescriptor {
        ShardDescriptor {
            database: database.map(str::to_string),
            ..ShardDescriptor::default()
        }
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let key = ShardKey::parse("4").unwrap();
        let factory = SqliteShardFactory::new().with_base_dir("/srv/shards");
        let path = factory.database_path(key, &descriptor(Some("shard_4.db"))).unwrap();
        assert_eq!(path, PathBuf::from("/srv/shards/shard_4.db"));
        let absolute = factory.database_path(key, &descriptor(Some("/tmp/x.db"))).unwrap();
        assert_eq!(absolute, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn missing_database_is_a_connect_error() {
        let key = ShardKey::parse("4").unwrap();
        let factory = SqliteShardFactory::new();
        assert!(factory.database_path(key, &descriptor(None)).is_err());
        assert!(factory.database_path(key, &descriptor(Some("  "))).is_err());
    }

    #[test]
    fn values_render_as_text() {
        assert_eq!(render_value(ValueRef::Null), None);
        assert_eq!(render_value(ValueRef::Integer(42)), Some("42".to_string()));
        assert_eq!(render_value(ValueRef::Text(b"plan")), Some("plan".to_string()));
    }
}
