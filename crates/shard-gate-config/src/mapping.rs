// crates/shard-gate-config/src/mapping.rs
// ============================================================================
// Module: Shard Mapping Loader
// Description: Loads the JSON shard-key to connection-string mapping.
// Purpose: Build a validated ShardMap once, before any shard is contacted.
// Dependencies: shard-gate-core, serde_json
// ============================================================================

//! ## Overview
//! The mapping file is a JSON object whose keys are shard keys (`"0"` to
//! `"f"`) and whose values are `key=value;...` connection strings. Keys are
//! normalised to lower case; two keys that normalise to the same shard are
//! rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use shard_gate_core::ShardMap;

use crate::config::ConfigError;
use crate::config::read_limited;
use crate::config::validate_path;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum mapping file size in bytes.
const MAX_MAPPING_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Loads and validates a shard mapping file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Parse`] when it is not a JSON object of strings, and
/// [`ConfigError::Invalid`] when the mapping itself is invalid.
pub fn load_shard_map(path: &Path) -> Result<ShardMap, ConfigError> {
    validate_path(path)?;
    let content = read_limited(path, MAX_MAPPING_FILE_SIZE, "mapping file")?;
    parse_shard_map(&content)
}

/// Parses mapping JSON text into a shard map.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON and
/// [`ConfigError::Invalid`] for invalid keys, connection strings, or an
/// empty mapping.
pub fn parse_shard_map(content: &str) -> Result<ShardMap, ConfigError> {
    let raw: BTreeMap<String, String> = serde_json::from_str(content)
        .map_err(|err| ConfigError::Parse(format!("mapping file: {err}")))?;
    ShardMap::from_connection_strings(
        raw.iter().map(|(key, connection)| (key.as_str(), connection.as_str())),
    )
    .map_err(|err| ConfigError::Invalid(err.to_string()))
}
