// crates/shard-gate-core/src/core/shard_map.rs
// ============================================================================
// Module: Shard Map
// Description: Shard connection descriptors and the key-to-shard mapping.
// Purpose: Provide an immutable, deterministically ordered shard topology.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`ShardMap`] maps each [`ShardKey`] to a [`ShardDescriptor`] parsed from
//! a `key=value;key=value` connection string. Iteration is always in
//! ascending key order so every coordinator phase visits shards in the same
//! reproducible sequence.
//!
//! ## Invariants
//! - Keys are unique after case normalisation.
//! - A map always holds at least one shard.
//! - Descriptors are immutable once constructed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ShardKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Host used when a connection string omits `host`.
pub const DEFAULT_HOST: &str = "localhost";
/// Port used when a connection string omits `port`.
pub const DEFAULT_PORT: u16 = 5432;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Shard map construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardMapError {
    /// A mapping key is not a single hex character.
    #[error("invalid shard key in mapping: {0:?}")]
    InvalidShardKey(String),
    /// Two mapping keys normalise to the same shard key.
    #[error("duplicate shard key in mapping: {0}")]
    DuplicateShardKey(ShardKey),
    /// The mapping contains no shards.
    #[error("shard mapping is empty")]
    Empty,
    /// A connection string could not be parsed.
    #[error("invalid connection string for shard {key}: {message}")]
    InvalidConnectionString {
        /// Shard key owning the connection string.
        key: String,
        /// Parse failure detail.
        message: String,
    },
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Connection parameters for one physical shard.
///
/// # Invariants
/// - `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShardDescriptor {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name (or file path for file-backed drivers).
    pub database: Option<String>,
    /// Login user name.
    pub username: Option<String>,
    /// Login password.
    #[serde(skip)]
    pub password: Option<String>,
}

impl ShardDescriptor {
    /// Parses a semicolon-separated `key=value` connection string.
    ///
    /// Keys are matched case-insensitively and split on the first `=`.
    /// Segments without `=` and unrecognised keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns a message describing the failure when `port` is not a valid
    /// port number.
    pub fn parse(connection: &str) -> Result<Self, String> {
        let mut descriptor = Self::default();
        for segment in connection.split(';') {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "host" => descriptor.host = value,
                "port" => {
                    descriptor.port =
                        value.parse().map_err(|_| format!("invalid port value '{value}'"))?;
                }
                "database" => descriptor.database = Some(value),
                "username" => descriptor.username = Some(value),
                "password" => descriptor.password = Some(value),
                _ => {}
            }
        }
        Ok(descriptor)
    }

    /// Returns a display label for the database.
    #[must_use]
    pub fn database_label(&self) -> &str {
        self.database.as_deref().unwrap_or("<default>")
    }
}

impl Default for ShardDescriptor {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: None,
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for ShardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// SECTION: Shard Map
// ============================================================================

/// Immutable mapping from shard key to shard descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMap {
    /// Descriptors keyed and ordered by shard key.
    shards: BTreeMap<ShardKey, ShardDescriptor>,
}

impl ShardMap {
    /// Builds a shard map from already-parsed entries.
    ///
    /// # Errors
    ///
    /// Returns [`ShardMapError`] when the entries are empty or contain a
    /// duplicate key.
    pub fn new(
        entries: impl IntoIterator<Item = (ShardKey, ShardDescriptor)>,
    ) -> Result<Self, ShardMapError> {
        let mut shards = BTreeMap::new();
        for (key, descriptor) in entries {
            if shards.insert(key, descriptor).is_some() {
                return Err(ShardMapError::DuplicateShardKey(key));
            }
        }
        if shards.is_empty() {
            return Err(ShardMapError::Empty);
        }
        Ok(Self {
            shards,
        })
    }

    /// Builds a shard map from raw `(key, connection string)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ShardMapError`] when a key or connection string is invalid,
    /// when keys collide, or when no entries are supplied.
    pub fn from_connection_strings<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ShardMapError> {
        let mut parsed = Vec::new();
        for (raw_key, connection) in entries {
            let key = ShardKey::parse(raw_key.trim())
                .map_err(|_| ShardMapError::InvalidShardKey(raw_key.to_string()))?;
            let descriptor = ShardDescriptor::parse(connection).map_err(|message| {
                ShardMapError::InvalidConnectionString {
                    key: raw_key.to_string(),
                    message,
                }
            })?;
            parsed.push((key, descriptor));
        }
        Self::new(parsed)
    }

    /// Returns the descriptor for `key`, if mapped.
    #[must_use]
    pub fn get(&self, key: ShardKey) -> Option<&ShardDescriptor> {
        self.shards.get(&key)
    }

    /// Iterates shards in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (ShardKey, &ShardDescriptor)> {
        self.shards.iter().map(|(key, descriptor)| (*key, descriptor))
    }

    /// Returns the number of mapped keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Returns true when no keys are mapped (never true for a constructed map).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Returns the number of distinct physical shards referenced by the map.
    #[must_use]
    pub fn distinct_shards(&self) -> usize {
        self.shards.values().collect::<BTreeSet<_>>().len()
    }

    /// Returns true when every one of the sixteen keys is mapped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        ShardKey::all().all(|key| self.shards.contains_key(&key))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::use_debug,
    reason = "Tests unwrap known-good fixtures and inspect Debug output."
)]
mod tests {
    use super::DEFAULT_HOST;
    use super::DEFAULT_PORT;
    use super::ShardDescriptor;
    use super::ShardMap;
    use super::ShardMapError;

    #[test]
    fn descriptor_parse_applies_defaults() {
        let descriptor = ShardDescriptor::parse("Database=plans_0;Username=app").unwrap();
        assert_eq!(descriptor.host, DEFAULT_HOST);
        assert_eq!(descriptor.port, DEFAULT_PORT);
        assert_eq!(descriptor.database.as_deref(), Some("plans_0"));
        assert_eq!(descriptor.username.as_deref(), Some("app"));
        assert!(descriptor.password.is_none());
    }

    #[test]
    fn descriptor_parse_splits_on_first_equals_and_skips_junk() {
        let descriptor =
            ShardDescriptor::parse("HOST=db1;port=6543;junk;Password=a=b;Database=x").unwrap();
        assert_eq!(descriptor.host, "db1");
        assert_eq!(descriptor.port, 6543);
        assert_eq!(descriptor.password.as_deref(), Some("a=b"));
    }

    #[test]
    fn descriptor_parse_rejects_bad_port() {
        assert!(ShardDescriptor::parse("Port=abc").is_err());
    }

    #[test]
    fn descriptor_debug_redacts_password() {
        let descriptor = ShardDescriptor::parse("Password=hunter2").unwrap();
        let rendered = format!("{descriptor:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn shard_map_rejects_case_collisions() {
        let result = ShardMap::from_connection_strings([("a", "Database=x"), ("A", "Database=y")]);
        assert!(matches!(result, Err(ShardMapError::DuplicateShardKey(_))));
    }

    #[test]
    fn shard_map_rejects_empty_and_bad_keys() {
        assert_eq!(ShardMap::from_connection_strings(Vec::<(&str, &str)>::new()), Err(ShardMapError::Empty));
        assert!(matches!(
            ShardMap::from_connection_strings([("zz", "Database=x")]),
            Err(ShardMapError::InvalidShardKey(_))
        ));
    }

    #[test]
    fn shard_map_iterates_sorted_and_counts_distinct() {
        let map = ShardMap::from_connection_strings([
            ("f", "Database=b"),
            ("0", "Database=a"),
            ("7", "Database=a"),
        ])
        .unwrap();
        let keys: String = map.iter().map(|(key, _)| key.as_char()).collect();
        assert_eq!(keys, "07f");
        assert_eq!(map.distinct_shards(), 2);
        assert!(!map.is_complete());
    }
}
