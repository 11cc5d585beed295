// crates/shard-gate-core/src/runtime/load.rs
// ============================================================================
// Module: Load Generator
// Description: Concurrent synthetic insert/read workloads across shards.
// Purpose: Measure per-phase success counts, throughput, and latency.
// Dependencies: crate::{core, interfaces, runtime}, rand
// ============================================================================

//! ## Overview
//! Each phase runs `n` independent operations on a fixed pool of scoped
//! worker threads. Workers claim operation slots from a shared counter, so
//! the pool never exceeds `concurrency` threads and the phase returns only
//! after every slot has finished. Every operation opens its own connection
//! and releases it before returning.
//!
//! Inserts route a fresh id, write one row in its own transaction, and
//! register the id only after the commit succeeds. Reads pick a registered id
//! at random and succeed iff the routed shard returns a row. Operation
//! failures are typed, counted, and never abort the phase. A panicking
//! operation is caught at its own slot and counted as
//! [`FailureKind::Panicked`]; its worker moves on to the next slot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use crate::core::BenchmarkMetrics;
use crate::core::EntityId;
use crate::core::FailureKind;
use crate::core::OperationFailure;
use crate::core::OperationResult;
use crate::core::ShardKey;
use crate::core::ShardMap;
use crate::core::Workload;
use crate::core::WorkloadError;
use crate::core::WorkloadStatements;
use crate::interfaces::ConnectPolicy;
use crate::interfaces::ConnectionFactory;
use crate::interfaces::EventSink;
use crate::interfaces::GateEvent;
use crate::interfaces::ShardDbError;
use crate::interfaces::SqlParam;
use crate::runtime::registry::IdRegistry;
use crate::runtime::router::ShardRouter;
use crate::runtime::session::TransactionSession;

// ============================================================================
// SECTION: Load Generator
// ============================================================================

/// Drives insert and read workloads against a shard map.
pub struct LoadGenerator<'a> {
    /// Connection source for every operation.
    factory: &'a dyn ConnectionFactory,
    /// Shard topology.
    map: &'a ShardMap,
    /// Ids committed by the insert phase.
    registry: &'a IdRegistry,
    /// Receiver of workload events.
    sink: &'a dyn EventSink,
    /// Rendered insert/select statements.
    statements: WorkloadStatements,
    /// Connection establishment policy.
    policy: ConnectPolicy,
    /// Id-to-shard router.
    router: ShardRouter,
}

impl<'a> LoadGenerator<'a> {
    /// Creates a generator writing to `table` in the factory's dialect.
    ///
    /// # Errors
    ///
    /// Returns [`WorkloadError::InvalidTable`] when `table` is not a valid
    /// identifier.
    pub fn new(
        factory: &'a dyn ConnectionFactory,
        map: &'a ShardMap,
        registry: &'a IdRegistry,
        sink: &'a dyn EventSink,
        table: &str,
    ) -> Result<Self, WorkloadError> {
        Ok(Self {
            factory,
            map,
            registry,
            sink,
            statements: WorkloadStatements::for_dialect(factory.dialect(), table)?,
            policy: ConnectPolicy::default(),
            router: ShardRouter,
        })
    }

    /// Replaces the connection policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ConnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs `n` insert operations on `concurrency` workers.
    #[must_use]
    pub fn run_insert_phase(&self, n: usize, concurrency: usize) -> BenchmarkMetrics {
        self.run_phase(Workload::Insert, n, concurrency, || self.insert_one())
    }

    /// Runs `n` read operations on `concurrency` workers.
    ///
    /// Call only after the insert phase has returned; reads draw from the
    /// registry that phase populated.
    #[must_use]
    pub fn run_read_phase(&self, n: usize, concurrency: usize) -> BenchmarkMetrics {
        self.run_phase(Workload::Read, n, concurrency, || self.read_one())
    }

    // ------------------------------------------------------------------------
    // Worker pool
    // ------------------------------------------------------------------------

    /// Runs `n` operations on a scoped pool and folds the results.
    fn run_phase<F>(
        &self,
        workload: Workload,
        n: usize,
        concurrency: usize,
        operation: F,
    ) -> BenchmarkMetrics
    where
        F: Fn() -> OperationResult + Sync,
    {
        let workers = concurrency.clamp(1, n.max(1));
        self.sink.record(&GateEvent::WorkloadStarted {
            workload,
            operations: n,
            concurrency: workers,
        });
        let next = AtomicUsize::new(0);
        let started = Instant::now();
        let results: Vec<(Duration, OperationResult)> = thread::scope(|scope| {
            let handles: Vec<_> = (0 .. workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut local = Vec::new();
                        while next.fetch_add(1, Ordering::Relaxed) < n {
                            let op_started = Instant::now();
                            let result = panic::catch_unwind(AssertUnwindSafe(&operation))
                                .unwrap_or_else(|payload| {
                                    Err(self.failure(
                                        workload,
                                        None,
                                        FailureKind::Panicked,
                                        &panic_message(payload.as_ref()),
                                    ))
                                });
                            local.push((op_started.elapsed(), result));
                        }
                        local
                    })
                })
                .collect();
            handles.into_iter().flat_map(|handle| handle.join().unwrap_or_default()).collect()
        });
        let metrics = BenchmarkMetrics::from_results(workload, &results, started.elapsed());
        self.sink.record(&GateEvent::WorkloadFinished {
            workload,
            operations: metrics.operations,
            successes: metrics.successes,
            elapsed_ms: metrics.elapsed.as_millis(),
        });
        metrics
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Inserts one fresh record and registers its id after commit.
    fn insert_one(&self) -> OperationResult {
        let workload = Workload::Insert;
        let id = EntityId::random();
        let key = self.router.route(&id);
        let mut session = self.open(workload, key)?;
        let written = self.write_record(&mut session, id);
        if written.is_ok() {
            self.registry.push(id);
        }
        // Closing rolls back a transaction left open by a failed insert.
        self.close(session);
        written.map_err(|err| self.failure(workload, Some(key), FailureKind::Execution, &err))
    }

    /// Begins, inserts, and commits one row.
    fn write_record(
        &self,
        session: &mut TransactionSession<'a>,
        id: EntityId,
    ) -> Result<(), ShardDbError> {
        session.begin()?;
        let title = format!("Plan {}", id.short());
        session.execute(&self.statements.insert, &[SqlParam::from(id), SqlParam::Text(title)])?;
        session.commit()
    }

    /// Reads back one random registered record.
    fn read_one(&self) -> OperationResult {
        let workload = Workload::Read;
        let Some(id) = self.registry.pick(&mut rand::thread_rng()) else {
            return Err(self.failure(
                workload,
                None,
                FailureKind::RegistryEmpty,
                &"no inserted ids available to read",
            ));
        };
        let key = self.router.route(&id);
        let mut session = self.open(workload, key)?;
        let row = session.query_opt(&self.statements.select, &[SqlParam::from(id)]);
        self.close(session);
        match row {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(self.failure(
                workload,
                Some(key),
                FailureKind::NotFound,
                &format!("no row for id {id}"),
            )),
            Err(err) => Err(self.failure(workload, Some(key), FailureKind::Execution, &err)),
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Opens a session on the shard for `key`.
    fn open(
        &self,
        workload: Workload,
        key: ShardKey,
    ) -> Result<TransactionSession<'a>, OperationFailure> {
        let Some(descriptor) = self.map.get(key) else {
            return Err(self.failure(
                workload,
                Some(key),
                FailureKind::UnmappedShard,
                &format!("shard {key} has no mapping entry"),
            ));
        };
        TransactionSession::open(self.factory, key, descriptor, &self.policy, self.sink)
            .map_err(|err| self.failure(workload, Some(key), FailureKind::Connection, &err))
    }

    /// Closes a session, recording any close failure.
    fn close(&self, session: TransactionSession<'a>) {
        let key = session.key();
        if let Err(err) = session.close() {
            self.sink.record(&GateEvent::CloseFailed {
                shard_key: key,
                error: err.to_string(),
            });
        }
    }

    /// Records and builds an operation failure.
    fn failure(
        &self,
        workload: Workload,
        shard_key: Option<ShardKey>,
        kind: FailureKind,
        error: &dyn std::fmt::Display,
    ) -> OperationFailure {
        let message = error.to_string();
        self.sink.record(&GateEvent::OperationFailed {
            workload,
            shard_key,
            kind,
            error: message.clone(),
        });
        OperationFailure::new(kind, message)
    }
}

/// Renders a caught panic payload as text.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("operation panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("operation panicked: {message}")
    } else {
        "operation panicked".to_string()
    }
}
