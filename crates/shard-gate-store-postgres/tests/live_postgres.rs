// crates/shard-gate-store-postgres/tests/live_postgres.rs
// ============================================================================
// Module: Live Postgres Tests
// Description: Coordinator and benchmark runs against a real PostgreSQL server.
// ============================================================================
//! ## Overview
//! Ignored by default. Set `SHARD_GATE_TEST_POSTGRES_URL` to a connection
//! string (`Host=...;Port=...;Database=...;Username=...;Password=...`) and
//! run with `--ignored`. Each test uses its own table name.

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

use shard_gate_core::IdRegistry;
use shard_gate_core::LoadGenerator;
use shard_gate_core::NoopEventSink;
use shard_gate_core::ShardKey;
use shard_gate_core::ShardMap;
use shard_gate_core::ShardStatus;
use shard_gate_core::TwoPhaseCoordinator;
use shard_gate_store_postgres::PostgresShardFactory;

const URL_ENV: &str = "SHARD_GATE_TEST_POSTGRES_URL";

fn connection_string() -> String {
    std::env::var(URL_ENV).expect("SHARD_GATE_TEST_POSTGRES_URL must be set for live tests")
}

fn unique_table(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

fn single_shard_map() -> ShardMap {
    let connection = connection_string();
    ShardMap::from_connection_strings([("0", connection.as_str())]).unwrap()
}

fn full_map_on_one_server() -> ShardMap {
    let connection = connection_string();
    let keys: Vec<String> = ShardKey::all().map(|key| key.to_string()).collect();
    ShardMap::from_connection_strings(keys.iter().map(|key| (key.as_str(), connection.as_str())))
        .unwrap()
}

#[test]
#[ignore = "requires a PostgreSQL server"]
fn apply_creates_table_and_replays_idempotently() {
    let factory = PostgresShardFactory::new();
    let map = single_shard_map();
    let table = unique_table("sg_apply");
    let sql = format!("CREATE TABLE IF NOT EXISTS {table} (id INT PRIMARY KEY);");
    let coordinator = TwoPhaseCoordinator::new(&factory, &NoopEventSink);

    assert!(coordinator.apply(&map, &sql).success);
    assert!(coordinator.apply(&map, &sql).success);
    assert!(coordinator.apply(&map, &format!("DROP TABLE {table};")).success);
}

#[test]
#[ignore = "requires a PostgreSQL server"]
fn failing_script_leaves_no_trace() {
    let factory = PostgresShardFactory::new();
    let map = single_shard_map();
    let table = unique_table("sg_rollback");
    let coordinator = TwoPhaseCoordinator::new(&factory, &NoopEventSink);

    let outcome =
        coordinator.apply(&map, &format!("CREATE TABLE {table} (id INT); SELECT 1/0;"));
    assert!(!outcome.success);
    assert_eq!(outcome.count(ShardStatus::RolledBack), 1);

    let probe = coordinator.apply(&map, &format!("SELECT 1 FROM {table};"));
    assert!(!probe.success, "table from the failed script must not exist");
}

#[test]
#[ignore = "requires a PostgreSQL server"]
fn benchmark_round_trips_rows() {
    let factory = PostgresShardFactory::new();
    let map = full_map_on_one_server();
    let table = unique_table("sg_bench");
    let create = format!(
        "CREATE TABLE {table} (id UUID PRIMARY KEY, title TEXT NOT NULL, created_at \
         TIMESTAMPTZ NOT NULL DEFAULT now());"
    );
    let setup = single_shard_map();
    let coordinator = TwoPhaseCoordinator::new(&factory, &NoopEventSink);
    assert!(coordinator.apply(&setup, &create).success);

    let registry = IdRegistry::new();
    let generator = LoadGenerator::new(&factory, &map, &registry, &NoopEventSink, &table).unwrap();
    let inserts = generator.run_insert_phase(40, 4);
    let reads = generator.run_read_phase(40, 4);

    assert_eq!(inserts.successes, 40);
    assert_eq!(reads.successes, 40);
    assert!(coordinator.apply(&setup, &format!("DROP TABLE {table};")).success);
}

#[test]
#[ignore = "requires a PostgreSQL server"]
fn benchmark_round_trips_rows_with_text_ids() {
    let factory = PostgresShardFactory::new();
    let map = full_map_on_one_server();
    let table = unique_table("sg_bench_text");
    let create = format!(
        "CREATE TABLE {table} (id CHAR(36) PRIMARY KEY, title TEXT NOT NULL, created_at \
         TIMESTAMPTZ NOT NULL DEFAULT now());"
    );
    let setup = single_shard_map();
    let coordinator = TwoPhaseCoordinator::new(&factory, &NoopEventSink);
    assert!(coordinator.apply(&setup, &create).success);

    let registry = IdRegistry::new();
    let generator = LoadGenerator::new(&factory, &map, &registry, &NoopEventSink, &table).unwrap();
    let inserts = generator.run_insert_phase(20, 4);
    let reads = generator.run_read_phase(20, 4);

    assert_eq!(inserts.successes, 20);
    assert_eq!(reads.successes, 20);
    assert!(coordinator.apply(&setup, &format!("DROP TABLE {table};")).success);
}
