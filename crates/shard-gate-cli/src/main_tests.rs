// crates/shard-gate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for bounded reads and driver selection.
// Purpose: Ensure oversized inputs fail closed and drivers map correctly.
// Dependencies: shard-gate-cli main helpers
// ============================================================================

//! ## Overview
//! Validates `read_bytes_with_limit`, SQL file decoding, and the factory
//! chosen for each driver.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use shard_gate_config::DriverKind;
use shard_gate_config::EventSinkKind;
use shard_gate_config::EventsConfig;
use shard_gate_core::SqlDialect;
use tempfile::TempDir;

use super::ReadLimitError;
use super::build_event_sink;
use super::build_factory;
use super::read_bytes_with_limit;
use super::read_sql_file;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn read_bytes_with_limit_allows_small_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.sql");
    fs::write(&path, b"SELECT 1;").unwrap();
    let bytes = read_bytes_with_limit(&path, 64).unwrap();
    assert_eq!(bytes, b"SELECT 1;");
}

#[test]
fn read_bytes_with_limit_rejects_large_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.sql");
    fs::write(&path, vec![b'x'; 65]).unwrap();
    match read_bytes_with_limit(&path, 64) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 65);
            assert_eq!(limit, 64);
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[test]
fn read_sql_file_rejects_invalid_utf8() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("binary.sql");
    fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
    let err = read_sql_file(&path).unwrap_err();
    assert!(err.to_string().contains("not valid UTF-8"));
}

#[test]
fn read_sql_file_reports_missing_file() {
    let err = read_sql_file(Path::new("/nonexistent/shard-gate/schema.sql")).unwrap_err();
    assert!(err.to_string().starts_with("Failed to read SQL file"));
}

#[test]
fn factory_dialect_follows_driver() {
    let mapping = Path::new("/srv/shards/mapping.json");
    assert_eq!(build_factory(DriverKind::Postgres, mapping).dialect(), SqlDialect::Postgres);
    assert_eq!(build_factory(DriverKind::Sqlite, mapping).dialect(), SqlDialect::Sqlite);
}

#[test]
fn file_event_sink_requires_writable_path() {
    let events = EventsConfig {
        sink: EventSinkKind::File,
        path: Some("/nonexistent/shard-gate/events.jsonl".to_string()),
    };
    let err = build_event_sink(&events).err().unwrap();
    assert!(err.to_string().starts_with("Failed to open event log"));
}
