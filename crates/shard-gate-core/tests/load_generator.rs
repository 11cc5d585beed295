// crates/shard-gate-core/tests/load_generator.rs
// ============================================================================
// Module: Load Generator Tests
// Description: Insert/read phases against the in-memory cluster.
// ============================================================================
//! ## Overview
//! Validates that inserts land on the routed shard, that only committed ids
//! reach the registry, that reads never exceed committed ids, and that
//! operation failures are counted by kind without aborting the phase.

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

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use shard_gate_core::ConnectPolicy;
use shard_gate_core::ConnectionFactory;
use shard_gate_core::DEFAULT_TABLE;
use shard_gate_core::FailureKind;
use shard_gate_core::GateEvent;
use shard_gate_core::IdRegistry;
use shard_gate_core::InMemoryShardCluster;
use shard_gate_core::LoadGenerator;
use shard_gate_core::NoopEventSink;
use shard_gate_core::RecordingEventSink;
use shard_gate_core::ShardConnection;
use shard_gate_core::ShardDbError;
use shard_gate_core::ShardDescriptor;
use shard_gate_core::ShardKey;
use shard_gate_core::ShardMap;
use shard_gate_core::ShardRouter;
use shard_gate_core::ShardRow;
use shard_gate_core::SqlDialect;
use shard_gate_core::SqlParam;
use shard_gate_core::Workload;
use shard_gate_core::WorkloadError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a map over the first `count` shard keys.
fn shard_map(count: usize) -> ShardMap {
    let entries: Vec<(String, String)> = ShardKey::all()
        .take(count)
        .map(|key| (key.to_string(), format!("Database=plans_{key}")))
        .collect();
    ShardMap::from_connection_strings(
        entries.iter().map(|(key, connection)| (key.as_str(), connection.as_str())),
    )
    .unwrap()
}

/// Cluster wrapper that panics on one chosen `connect` call.
struct PanicOnConnect {
    /// Backing cluster.
    inner: InMemoryShardCluster,
    /// Connect calls seen so far.
    calls: AtomicUsize,
    /// One-based call number that panics.
    panic_on: usize,
}

impl ConnectionFactory for PanicOnConnect {
    fn dialect(&self) -> SqlDialect {
        self.inner.dialect()
    }

    fn connect(
        &self,
        key: ShardKey,
        descriptor: &ShardDescriptor,
        policy: &ConnectPolicy,
    ) -> Result<Box<dyn ShardConnection>, ShardDbError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.panic_on {
            panic!("driver crashed on connect {call}");
        }
        self.inner.connect(key, descriptor, policy)
    }
}

/// Cluster wrapper that tracks how many connections are open at once.
struct PeakTrackingFactory {
    /// Backing cluster.
    inner: InMemoryShardCluster,
    /// Connections currently open.
    live: Arc<AtomicUsize>,
    /// Highest value `live` has reached.
    peak: Arc<AtomicUsize>,
}

impl ConnectionFactory for PeakTrackingFactory {
    fn dialect(&self) -> SqlDialect {
        self.inner.dialect()
    }

    fn connect(
        &self,
        key: ShardKey,
        descriptor: &ShardDescriptor,
        policy: &ConnectPolicy,
    ) -> Result<Box<dyn ShardConnection>, ShardDbError> {
        let inner = self.inner.connect(key, descriptor, policy)?;
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        // Hold the slot briefly so overlapping workers are observable.
        thread::sleep(Duration::from_millis(1));
        Ok(Box::new(TrackedConnection {
            inner: Some(inner),
            live: Arc::clone(&self.live),
        }))
    }
}

/// Connection that releases its live-count slot when dropped.
struct TrackedConnection {
    /// Wrapped connection, taken on close.
    inner: Option<Box<dyn ShardConnection>>,
    /// Shared live-connection counter.
    live: Arc<AtomicUsize>,
}

impl TrackedConnection {
    /// Returns the wrapped connection.
    fn inner(&mut self) -> &mut dyn ShardConnection {
        self.inner.as_deref_mut().unwrap()
    }
}

impl Drop for TrackedConnection {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ShardConnection for TrackedConnection {
    fn begin(&mut self) -> Result<(), ShardDbError> {
        self.inner().begin()
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), ShardDbError> {
        self.inner().execute_batch(sql)
    }

    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ShardDbError> {
        self.inner().execute(sql, params)
    }

    fn query_opt(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<ShardRow>, ShardDbError> {
        self.inner().query_opt(sql, params)
    }

    fn commit(&mut self) -> Result<(), ShardDbError> {
        self.inner().commit()
    }

    fn rollback(&mut self) -> Result<(), ShardDbError> {
        self.inner().rollback()
    }

    fn close(mut self: Box<Self>) -> Result<(), ShardDbError> {
        match self.inner.take() {
            Some(inner) => inner.close(),
            None => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn insert_then_read_round_trips_through_routed_shards() {
    let cluster = InMemoryShardCluster::new();
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(&cluster, &map, &registry, &NoopEventSink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(100, 10);
    assert_eq!(inserts.workload, Workload::Insert);
    assert_eq!(inserts.operations, 100);
    assert_eq!(inserts.successes, 100);
    assert_eq!(registry.len(), 100);
    assert_eq!(cluster.total_rows(), 100);
    for id in registry.snapshot() {
        assert!(cluster.contains_row(ShardRouter.route(&id), &id.to_string()));
    }

    let reads = generator.run_read_phase(100, 10);
    assert_eq!(reads.operations, 100);
    assert_eq!(reads.successes, 100);
    assert_eq!(cluster.opened(), 200);
    assert_eq!(cluster.closed(), 200);
    assert_eq!(cluster.open_transactions(), 0);
    assert!(reads.throughput > 0.0);
    assert!(reads.latency.min <= reads.latency.p50 && reads.latency.p50 <= reads.latency.max);
}

#[test]
fn read_phase_on_empty_registry_fails_without_connecting() {
    let cluster = InMemoryShardCluster::new();
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(&cluster, &map, &registry, &NoopEventSink, DEFAULT_TABLE).unwrap();

    let reads = generator.run_read_phase(20, 4);

    assert_eq!(reads.successes, 0);
    assert_eq!(reads.failures.get(&FailureKind::RegistryEmpty), Some(&20));
    assert_eq!(cluster.opened(), 0);
}

#[test]
fn failed_inserts_never_reach_the_registry() {
    let cluster = InMemoryShardCluster::new();
    let down = ShardKey::parse("3").unwrap();
    cluster.fail_connect(down);
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(&cluster, &map, &registry, &NoopEventSink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(200, 8);

    assert_eq!(inserts.successes + inserts.failed(), 200);
    assert_eq!(inserts.failures.get(&FailureKind::Connection).copied().unwrap_or(0), inserts.failed());
    assert_eq!(registry.len(), inserts.successes);
    assert!(registry.snapshot().iter().all(|id| ShardRouter.route(id) != down));

    let reads = generator.run_read_phase(200, 8);
    assert_eq!(reads.successes, 200);
    assert_eq!(reads.failed(), 0);
}

#[test]
fn ids_routed_to_unmapped_keys_are_counted_separately() {
    let cluster = InMemoryShardCluster::new();
    let map = shard_map(8);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(&cluster, &map, &registry, &NoopEventSink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(200, 8);

    let unmapped = inserts.failures.get(&FailureKind::UnmappedShard).copied().unwrap_or(0);
    assert_eq!(unmapped, inserts.failed());
    assert_eq!(registry.len(), inserts.successes);
    assert!(registry.snapshot().iter().all(|id| map.get(ShardRouter.route(id)).is_some()));
    assert_eq!(cluster.opened(), inserts.successes);
}

#[test]
fn insert_statement_failures_roll_back_and_close() {
    let cluster = InMemoryShardCluster::new();
    cluster.fail_sql_containing("INSERT INTO");
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let sink = RecordingEventSink::new();
    let generator = LoadGenerator::new(&cluster, &map, &registry, &sink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(25, 5);

    assert_eq!(inserts.successes, 0);
    assert_eq!(inserts.failures.get(&FailureKind::Execution), Some(&25));
    assert!(registry.is_empty());
    assert_eq!(cluster.total_rows(), 0);
    assert_eq!(cluster.open_transactions(), 0);
    assert_eq!(cluster.opened(), cluster.closed());
    let failures = sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, GateEvent::OperationFailed { kind: FailureKind::Execution, .. }))
        .count();
    assert_eq!(failures, 25);
}

#[test]
fn commit_failures_are_counted_and_not_registered() {
    let cluster = InMemoryShardCluster::new();
    for key in ShardKey::all() {
        cluster.fail_commit(key);
    }
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(&cluster, &map, &registry, &NoopEventSink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(10, 2);

    assert_eq!(inserts.successes, 0);
    assert!(registry.is_empty());
    assert_eq!(cluster.total_rows(), 0);
}

#[test]
fn worker_pool_is_capped_by_operation_count() {
    let cluster = InMemoryShardCluster::new();
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let sink = RecordingEventSink::new();
    let generator = LoadGenerator::new(&cluster, &map, &registry, &sink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(3, 50);

    assert_eq!(inserts.successes, 3);
    assert!(sink.events().contains(&GateEvent::WorkloadStarted {
        workload: Workload::Insert,
        operations: 3,
        concurrency: 3,
    }));
}

#[test]
fn empty_phase_reports_zero_throughput() {
    let cluster = InMemoryShardCluster::new();
    let map = shard_map(1);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(&cluster, &map, &registry, &NoopEventSink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(0, 10);

    assert_eq!(inserts.operations, 0);
    assert!(inserts.throughput.abs() < f64::EPSILON);
    assert_eq!(cluster.opened(), 0);
}

#[test]
fn invalid_table_names_are_rejected_up_front() {
    let cluster = InMemoryShardCluster::new();
    let map = shard_map(1);
    let registry = IdRegistry::new();
    let result = LoadGenerator::new(&cluster, &map, &registry, &NoopEventSink, "plans;drop");
    assert!(matches!(result, Err(WorkloadError::InvalidTable(_))));
}

#[test]
fn panicking_operation_is_counted_and_the_phase_continues() {
    let factory = PanicOnConnect {
        inner: InMemoryShardCluster::new(),
        calls: AtomicUsize::new(0),
        panic_on: 6,
    };
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let sink = RecordingEventSink::new();
    let generator = LoadGenerator::new(&factory, &map, &registry, &sink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(100, 1);

    assert_eq!(inserts.operations, 100);
    assert_eq!(inserts.successes, 99);
    assert_eq!(inserts.failures.get(&FailureKind::Panicked), Some(&1));
    assert_eq!(registry.len(), 99);
    assert_eq!(factory.inner.total_rows(), 99);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        GateEvent::OperationFailed { kind: FailureKind::Panicked, error, .. }
            if error.contains("driver crashed on connect 6")
    )));
}

#[test]
fn open_connections_never_exceed_concurrency() {
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let factory = PeakTrackingFactory {
        inner: InMemoryShardCluster::new(),
        live: Arc::clone(&live),
        peak: Arc::clone(&peak),
    };
    let map = shard_map(16);
    let registry = IdRegistry::new();
    let generator =
        LoadGenerator::new(&factory, &map, &registry, &NoopEventSink, DEFAULT_TABLE).unwrap();

    let inserts = generator.run_insert_phase(200, 4);
    let reads = generator.run_read_phase(200, 4);

    assert_eq!(inserts.successes, 200);
    assert_eq!(reads.successes, 200);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1);
    assert!(peak <= 4, "peak open connections {peak} exceeded concurrency 4");
    assert_eq!(live.load(Ordering::SeqCst), 0);
}
