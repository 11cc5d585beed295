// crates/shard-gate-core/src/core/statements.rs
// ============================================================================
// Module: Workload Statements
// Description: Dialect-specific insert and point-read statements.
// Purpose: Render benchmark SQL once per phase with a validated table name.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The benchmark inserts `(id, title)` rows and reads them back by id. The
//! only dialect difference the harness cares about is placeholder syntax and
//! whether columns must be cast to text for the read path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default benchmark table.
pub const DEFAULT_TABLE: &str = "travel_plans";
/// Maximum length of each dotted part of a table name.
const MAX_IDENTIFIER_LENGTH: usize = 63;

// ============================================================================
// SECTION: Types
// ============================================================================

/// SQL dialect spoken by a connection factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    /// `PostgreSQL` (`$1` placeholders).
    #[default]
    Postgres,
    /// `SQLite` (`?1` placeholders).
    Sqlite,
}

/// Workload statement errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkloadError {
    /// Table name is not a plain or schema-qualified identifier.
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),
}

/// Rendered benchmark statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadStatements {
    /// Insert statement taking `(id, title)`.
    pub insert: String,
    /// Select statement taking `(id)` and returning `(id, title, created_at)`.
    pub select: String,
}

impl WorkloadStatements {
    /// Renders the statements for `dialect` against `table`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkloadError::InvalidTable`] when `table` is not a valid
    /// identifier.
    pub fn for_dialect(dialect: SqlDialect, table: &str) -> Result<Self, WorkloadError> {
        validate_table_name(table)?;
        Ok(match dialect {
            SqlDialect::Postgres => Self {
                insert: format!("INSERT INTO {table} (id, title) VALUES ($1, $2)"),
                select: format!(
                    "SELECT id::text, title, created_at::text FROM {table} WHERE id = $1"
                ),
            },
            SqlDialect::Sqlite => Self {
                insert: format!("INSERT INTO {table} (id, title) VALUES (?1, ?2)"),
                select: format!("SELECT id, title, created_at FROM {table} WHERE id = ?1"),
            },
        })
    }
}

/// Validates a plain or schema-qualified SQL identifier.
///
/// # Errors
///
/// Returns [`WorkloadError::InvalidTable`] when any part is empty, too long,
/// starts with a digit, or contains characters other than ASCII
/// alphanumerics and `_`.
pub fn validate_table_name(table: &str) -> Result<(), WorkloadError> {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        return Err(WorkloadError::InvalidTable(table.to_string()));
    }
    for part in parts {
        let valid = !part.is_empty()
            && part.len() <= MAX_IDENTIFIER_LENGTH
            && !part.starts_with(|ch: char| ch.is_ascii_digit())
            && part.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !valid {
            return Err(WorkloadError::InvalidTable(table.to_string()));
        }
    }
    Ok(())
}
