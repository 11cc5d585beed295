// crates/shard-gate-core/src/runtime/coordinator.rs
// ============================================================================
// Module: Two-Phase Coordinator
// Description: Best-effort BEGIN/EXECUTE/FINALIZE of one SQL unit on all shards.
// Purpose: Apply a script everywhere or nowhere, and report per-shard status.
// Dependencies: crate::{core, interfaces, runtime::session}
// ============================================================================

//! ## Overview
//! [`TwoPhaseCoordinator::apply`] runs three strictly ordered phases across
//! every shard in a [`ShardMap`], in ascending shard-key order:
//!
//! 1. **Begin** opens a connection and transaction per shard. Any failure
//!    aborts the call: transactions opened so far are rolled back and their
//!    connections closed, and nothing is executed anywhere.
//! 2. **Execute** runs the SQL unit as one batch per shard and stops at the
//!    first failure. Later shards are never executed.
//! 3. **Finalize** commits every shard when all executes succeeded, and
//!    otherwise rolls every shard back. Each connection is then closed
//!    exactly once, even when commit or rollback fails.
//!
//! Security posture: SQL text is operator supplied and executed verbatim.
//!
//! This is not an atomic-commit protocol. There is no prepare vote and no
//! durable decision log, so a commit failure or crash part-way through
//! finalize can leave shards inconsistent. A commit failure is reported in
//! the outcome and never hidden.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::CoordinatorOutcome;
use crate::core::CoordinatorPhase;
use crate::core::PhaseError;
use crate::core::ShardKey;
use crate::core::ShardMap;
use crate::core::ShardReport;
use crate::core::ShardStatus;
use crate::interfaces::ConnectPolicy;
use crate::interfaces::ConnectionFactory;
use crate::interfaces::EventSink;
use crate::interfaces::GateEvent;
use crate::interfaces::ShardDbError;
use crate::runtime::session::TransactionSession;

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Coordinates one SQL unit across every shard of a map.
pub struct TwoPhaseCoordinator<'a> {
    /// Connection source for every shard.
    factory: &'a dyn ConnectionFactory,
    /// Receiver of phase transition events.
    sink: &'a dyn EventSink,
    /// Connection establishment policy.
    policy: ConnectPolicy,
}

/// Live session paired with the index of its report.
struct OpenShard<'a> {
    /// Session for the shard.
    session: TransactionSession<'a>,
    /// Index into the report list.
    report: usize,
}

impl<'a> TwoPhaseCoordinator<'a> {
    /// Creates a coordinator with the default (no timeout, no retry) policy.
    #[must_use]
    pub fn new(factory: &'a dyn ConnectionFactory, sink: &'a dyn EventSink) -> Self {
        Self {
            factory,
            sink,
            policy: ConnectPolicy::default(),
        }
    }

    /// Replaces the connection policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ConnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Applies `sql` to every shard in `map`.
    ///
    /// The returned outcome is the only result channel: per-shard driver
    /// errors are captured in the reports rather than returned as `Err`.
    #[must_use]
    pub fn apply(&self, map: &ShardMap, sql: &str) -> CoordinatorOutcome {
        let mut reports = Vec::with_capacity(map.len());
        let outcome = match self.begin_all(map, &mut reports) {
            Ok(mut open) => {
                let executed_all = self.execute_all(&mut open, &mut reports, sql, map.len());
                self.finalize_all(open, &mut reports, executed_all);
                let success = executed_all
                    && reports
                        .iter()
                        .all(|report| report.executed && report.status == ShardStatus::Committed);
                CoordinatorOutcome {
                    shards: reports,
                    aborted_at: (!executed_all).then_some(CoordinatorPhase::Execute),
                    success,
                }
            }
            Err(()) => CoordinatorOutcome {
                shards: reports,
                aborted_at: Some(CoordinatorPhase::Begin),
                success: false,
            },
        };
        self.sink.record(&GateEvent::ApplyFinished {
            success: outcome.success,
            aborted_at: outcome.aborted_at,
        });
        outcome
    }

    // ------------------------------------------------------------------------
    // Phase 1: Begin
    // ------------------------------------------------------------------------

    /// Opens a transaction on every shard, or rolls back and closes all of
    /// them on the first failure.
    fn begin_all(
        &self,
        map: &ShardMap,
        reports: &mut Vec<ShardReport>,
    ) -> Result<Vec<OpenShard<'a>>, ()> {
        self.sink.record(&GateEvent::BeginStarted {
            shards: map.len(),
        });
        let mut open = Vec::with_capacity(map.len());
        for (key, descriptor) in map.iter() {
            let database = descriptor.database_label().to_string();
            let begun = TransactionSession::open(self.factory, key, descriptor, &self.policy, self.sink)
                .and_then(|mut session| session.begin().map(|()| session));
            match begun {
                Ok(session) => {
                    self.sink.record(&GateEvent::ShardBegun {
                        shard_key: key,
                        database: database.clone(),
                    });
                    open.push(OpenShard {
                        session,
                        report: reports.len(),
                    });
                    reports.push(ShardReport {
                        shard_key: key,
                        database,
                        executed: false,
                        status: ShardStatus::Begun,
                        error: None,
                    });
                }
                Err(err) => {
                    self.record_failure(key, CoordinatorPhase::Begin, &err);
                    reports.push(failed_report(key, database, CoordinatorPhase::Begin, &err));
                    self.abort_begun(open, reports);
                    return Err(());
                }
            }
        }
        Ok(open)
    }

    /// Releases shards opened before a Begin failure. Cleanup failures are
    /// recorded, never propagated.
    fn abort_begun(&self, open: Vec<OpenShard<'a>>, reports: &mut [ShardReport]) {
        for OpenShard {
            mut session,
            report,
        } in open
        {
            let key = session.key();
            match session.rollback() {
                Ok(()) => {
                    self.sink.record(&GateEvent::ShardRolledBack {
                        shard_key: key,
                    });
                    reports[report].status = ShardStatus::RolledBack;
                }
                Err(err) => {
                    self.record_failure(key, CoordinatorPhase::Finalize, &err);
                    mark_failed(&mut reports[report], CoordinatorPhase::Finalize, &err);
                }
            }
            self.close(session);
        }
    }

    // ------------------------------------------------------------------------
    // Phase 2: Execute
    // ------------------------------------------------------------------------

    /// Executes `sql` on each open shard in order, stopping at the first
    /// failure. Returns true when every shard in the map executed.
    fn execute_all(
        &self,
        open: &mut [OpenShard<'a>],
        reports: &mut [ShardReport],
        sql: &str,
        expected: usize,
    ) -> bool {
        self.sink.record(&GateEvent::ExecuteStarted);
        let mut executed = 0usize;
        for shard in open.iter_mut() {
            let key = shard.session.key();
            let report = &mut reports[shard.report];
            match shard.session.execute_batch(sql) {
                Ok(()) => {
                    report.executed = true;
                    report.status = ShardStatus::Executed;
                    executed += 1;
                    self.sink.record(&GateEvent::ShardExecuted {
                        shard_key: key,
                    });
                }
                Err(err) => {
                    self.record_failure(key, CoordinatorPhase::Execute, &err);
                    mark_failed(report, CoordinatorPhase::Execute, &err);
                    return false;
                }
            }
        }
        executed == expected
    }

    // ------------------------------------------------------------------------
    // Phase 3: Finalize
    // ------------------------------------------------------------------------

    /// Commits or rolls back every open shard, then closes each connection.
    fn finalize_all(&self, open: Vec<OpenShard<'a>>, reports: &mut [ShardReport], commit: bool) {
        self.sink.record(&GateEvent::FinalizeStarted {
            commit,
        });
        for OpenShard {
            mut session,
            report,
        } in open
        {
            let key = session.key();
            let report = &mut reports[report];
            if commit {
                match session.commit() {
                    Ok(()) => {
                        report.status = ShardStatus::Committed;
                        self.sink.record(&GateEvent::ShardCommitted {
                            shard_key: key,
                        });
                    }
                    Err(err) => {
                        self.record_failure(key, CoordinatorPhase::Finalize, &err);
                        mark_failed(report, CoordinatorPhase::Finalize, &err);
                    }
                }
            } else {
                match session.rollback() {
                    Ok(()) => {
                        report.status = ShardStatus::RolledBack;
                        self.sink.record(&GateEvent::ShardRolledBack {
                            shard_key: key,
                        });
                    }
                    Err(err) => {
                        self.record_failure(key, CoordinatorPhase::Finalize, &err);
                        mark_failed(report, CoordinatorPhase::Finalize, &err);
                    }
                }
            }
            self.close(session);
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

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

    /// Records a shard failure event.
    fn record_failure(&self, key: ShardKey, phase: CoordinatorPhase, err: &ShardDbError) {
        self.sink.record(&GateEvent::ShardFailed {
            shard_key: key,
            phase,
            error: err.to_string(),
        });
    }
}

/// Builds a report for a shard that failed before it was tracked.
fn failed_report(
    key: ShardKey,
    database: String,
    phase: CoordinatorPhase,
    err: &ShardDbError,
) -> ShardReport {
    ShardReport {
        shard_key: key,
        database,
        executed: false,
        status: ShardStatus::Failed,
        error: Some(PhaseError {
            phase,
            message: err.to_string(),
        }),
    }
}

/// Marks a report failed, keeping the first captured error.
fn mark_failed(report: &mut ShardReport, phase: CoordinatorPhase, err: &ShardDbError) {
    report.status = ShardStatus::Failed;
    if report.error.is_none() {
        report.error = Some(PhaseError {
            phase,
            message: err.to_string(),
        });
    }
}
