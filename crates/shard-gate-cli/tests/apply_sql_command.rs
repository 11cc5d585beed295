// crates/shard-gate-cli/tests/apply_sql_command.rs
// ============================================================================
// Module: CLI Apply Command Tests
// Description: Integration tests for `shard-gate apply-sql` on SQLite shards.
// Purpose: Ensure the binary applies, reports, and fails closed end to end.
// Dependencies: shard-gate-cli binary, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Runs the CLI binary against a mapping of `SQLite` shard files in a
//! temporary directory and checks console output, exit codes, and the
//! resulting database state.

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
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS travel_plans (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);";

fn shard_gate_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_shard-gate"))
}

fn write_mapping(dir: &Path, keys: &[&str]) -> PathBuf {
    let entries: Vec<String> =
        keys.iter().map(|key| format!("\"{key}\": \"Database=shard_{key}.db\"")).collect();
    let path = dir.join("mapping.json");
    fs::write(&path, format!("{{{}}}", entries.join(", "))).expect("write mapping");
    path
}

fn all_keys() -> Vec<&'static str> {
    vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "a", "b", "c", "d", "e", "f"]
}

fn apply(dir: &Path, mapping: &Path, sql: &str, extra: &[&str]) -> Output {
    let sql_path = dir.join("script.sql");
    fs::write(&sql_path, sql).expect("write sql");
    Command::new(shard_gate_bin())
        .current_dir(dir)
        .env_remove("SHARD_GATE_CONFIG")
        .args(["apply-sql", "--driver", "sqlite", "--mapping"])
        .arg(mapping)
        .arg("--file")
        .arg(&sql_path)
        .args(extra)
        .output()
        .expect("run apply-sql")
}

fn table_exists(dir: &Path, key: &str, table: &str) -> bool {
    let path = dir.join(format!("shard_{key}.db"));
    if !path.exists() {
        return false;
    }
    let connection = rusqlite::Connection::open(path).unwrap();
    let count: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    count == 1
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies a schema script commits on all sixteen shards.
#[test]
fn apply_sql_commits_on_every_shard() {
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(dir.path(), &all_keys());

    let output = apply(dir.path(), &mapping, CREATE_TABLE, &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "unexpected stdout: {stdout}");
    assert!(stdout.contains("Databases: 16"), "unexpected stdout: {stdout}");
    assert!(stdout.contains("--- Phase 1: BEGIN transactions ---"));
    assert!(stdout.contains("  [f] Connected to shard_f.db - BEGIN"));
    assert!(stdout.contains("  [0] SQL executed successfully"));
    assert!(stdout.contains("--- Phase 3: COMMIT ---"));
    assert!(stdout.contains("  Result: SUCCESS"));
    assert_eq!(stdout.matches("] COMMIT").count(), 16);
    for key in all_keys() {
        assert!(table_exists(dir.path(), key, "travel_plans"));
    }
}

/// Verifies a failing statement rolls back every shard and exits non-zero.
#[test]
fn apply_sql_failure_rolls_back_and_fails() {
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(dir.path(), &["0", "1", "2"]);

    let output = apply(
        dir.path(),
        &mapping,
        "CREATE TABLE extra (id TEXT); INSERT INTO missing_table (id) VALUES ('x');",
        &[],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("  [0] ERROR:"), "unexpected stdout: {stdout}");
    assert!(stdout.contains("--- Phase 3: ROLLBACK ---"));
    assert!(stdout.contains("  Result: FAILED"));
    assert!(!stdout.contains("] COMMIT"));
    for key in ["0", "1", "2"] {
        assert!(!table_exists(dir.path(), key, "extra"));
    }
}

/// Verifies an empty SQL file is rejected before any shard is opened.
#[test]
fn apply_sql_rejects_empty_file() {
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(dir.path(), &["0"]);

    let output = apply(dir.path(), &mapping, "  \n", &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is empty"), "unexpected stderr: {stderr}");
    assert!(!dir.path().join("shard_0.db").exists());
}

/// Verifies an invalid mapping fails closed with an explicit error.
#[test]
fn apply_sql_rejects_invalid_mapping() {
    let dir = TempDir::new().unwrap();
    let mapping = dir.path().join("mapping.json");
    fs::write(&mapping, r#"{"g": "Database=shard_g.db"}"#).unwrap();

    let output = apply(dir.path(), &mapping, CREATE_TABLE, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load mapping file"), "unexpected stderr: {stderr}");
}

/// Verifies JSON output carries the full per-shard outcome.
#[test]
fn apply_sql_json_reports_outcome() {
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(dir.path(), &["3", "a"]);

    let output = apply(dir.path(), &mapping, CREATE_TABLE, &["--format", "json"]);
    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["databases"], 2);
    assert_eq!(document["outcome"]["success"], true);
    let shards = document["outcome"]["shards"].as_array().unwrap();
    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0]["shard_key"], "3");
    assert_eq!(shards[0]["status"], "committed");
    assert_eq!(shards[1]["shard_key"], "a");
}

/// Verifies the config file's event sink receives JSON lines.
#[test]
fn apply_sql_writes_configured_event_log() {
    let dir = TempDir::new().unwrap();
    let mapping = write_mapping(dir.path(), &["0"]);
    let events = dir.path().join("events.jsonl");
    let config = dir.path().join("shard-gate.toml");
    fs::write(
        &config,
        format!("[events]\nsink = \"file\"\npath = \"{}\"\n", events.display()),
    )
    .unwrap();

    let output = apply(dir.path(), &mapping, CREATE_TABLE, &[]);
    assert!(output.status.success());
    let log = fs::read_to_string(&events).unwrap();
    let first: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(first["event"], "begin_started");
    assert!(first["timestamp_ms"].is_u64());
    assert!(log.contains("\"event\":\"apply_finished\""));
}
