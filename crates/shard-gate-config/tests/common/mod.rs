// crates/shard-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config and mapping tests.
// Purpose: Reduce duplication across integration tests for shard-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::PathBuf;

use shard_gate_config::ConfigError;
use tempfile::TempDir;

/// Result type used by every test.
pub type TestResult = Result<(), String>;

/// Writes `contents` to `name` inside a fresh temp dir.
pub fn write_temp(name: &str, contents: &str) -> Result<(TempDir, PathBuf), String> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join(name);
    std::fs::write(&path, contents).map_err(|err| err.to_string())?;
    Ok((dir, path))
}

/// Asserts that a result is an error whose message contains `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid input".to_string()),
    }
}

/// Builds a full sixteen-shard mapping document.
pub fn full_mapping_json() -> String {
    let entries: Vec<String> = "0123456789abcdef"
        .chars()
        .map(|key| {
            format!(
                "\"{key}\": \"Host=db{key}.internal;Port=5432;Database=plans_{key};Username=app;Password=secret\""
            )
        })
        .collect();
    format!("{{{}}}", entries.join(","))
}
