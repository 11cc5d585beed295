// crates/shard-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Shard Gate Interfaces
// Description: Driver-agnostic connection and event-sink interfaces.
// Purpose: Define the contract surfaces the coordinator and harness depend on.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The core talks to databases only through [`ConnectionFactory`] and
//! [`ShardConnection`]. Connections are never pooled: every session or
//! benchmark operation opens its own connection and closes it before it
//! returns. Transactions are explicit; implementations must not auto-commit
//! between [`ShardConnection::begin`] and [`ShardConnection::commit`].
//!
//! Diagnostics flow through [`EventSink`] as typed [`GateEvent`] values so
//! callers can route them to stderr, a file, or a human report.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::CoordinatorPhase;
use crate::core::EntityId;
use crate::core::FailureKind;
use crate::core::ShardDescriptor;
use crate::core::ShardKey;
use crate::core::SqlDialect;
use crate::core::Workload;

// ============================================================================
// SECTION: Statement Values
// ============================================================================

/// Typed statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    /// Text value.
    Text(String),
    /// UUID value (bound natively where the driver supports it).
    Uuid(Uuid),
}

impl From<EntityId> for SqlParam {
    fn from(value: EntityId) -> Self {
        Self::Uuid(*value.as_uuid())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A fetched row with every column rendered as optional text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShardRow {
    /// Column values in select order (`None` for SQL NULL).
    pub columns: Vec<Option<String>>,
}

impl ShardRow {
    /// Returns the value of column `index`, if present and non-null.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(Option::as_deref)
    }
}

// ============================================================================
// SECTION: Connection Interfaces
// ============================================================================

/// Driver errors, classified by the call that failed.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardDbError {
    /// Establishing the session failed.
    #[error("connection error: {0}")]
    Connect(String),
    /// Starting or running statements failed.
    #[error("execution error: {0}")]
    Execute(String),
    /// Fetching rows failed.
    #[error("query error: {0}")]
    Query(String),
    /// Commit failed.
    #[error("commit error: {0}")]
    Commit(String),
    /// Rollback failed.
    #[error("rollback error: {0}")]
    Rollback(String),
    /// Closing the connection failed.
    #[error("close error: {0}")]
    Close(String),
}

/// Connection establishment policy.
///
/// Defaults match the observed behaviour: no timeout and no retry. Retries
/// apply to connection establishment only; statements are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectPolicy {
    /// Maximum time to wait for a connection, if bounded.
    pub connect_timeout: Option<Duration>,
    /// Per-statement server-side timeout, where the driver supports one.
    pub statement_timeout: Option<Duration>,
    /// Additional connection attempts after the first failure.
    pub connect_retries: u32,
}

/// One open database session with explicit transaction control.
pub trait ShardConnection: Send {
    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Execute`] when the transaction cannot start.
    fn begin(&mut self) -> Result<(), ShardDbError>;

    /// Executes one or more statements as a single batch.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Execute`] when any statement fails.
    fn execute_batch(&mut self, sql: &str) -> Result<(), ShardDbError>;

    /// Executes a parameterized statement and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Execute`] when the statement fails.
    fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64, ShardDbError>;

    /// Runs a parameterized query and returns its first row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Query`] when the query fails.
    fn query_opt(
        &mut self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<ShardRow>, ShardDbError>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Commit`] when the commit fails.
    fn commit(&mut self) -> Result<(), ShardDbError>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Rollback`] when the rollback fails.
    fn rollback(&mut self) -> Result<(), ShardDbError>;

    /// Closes the connection, consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Close`] when the driver reports a close failure.
    fn close(self: Box<Self>) -> Result<(), ShardDbError>;
}

/// Opens fresh connections from shard descriptors.
pub trait ConnectionFactory: Send + Sync {
    /// SQL dialect spoken by connections from this factory.
    fn dialect(&self) -> SqlDialect;

    /// Opens a new connection to the shard described by `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ShardDbError::Connect`] when the connection cannot be opened.
    fn connect(
        &self,
        key: ShardKey,
        descriptor: &ShardDescriptor,
        policy: &ConnectPolicy,
    ) -> Result<Box<dyn ShardConnection>, ShardDbError>;
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Structured diagnostic event.
///
/// # Invariants
/// - Variants are stable for log consumers; the `event` tag is snake case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GateEvent {
    /// Begin phase started.
    BeginStarted {
        /// Number of shards in the map.
        shards: usize,
    },
    /// A shard connection opened and its transaction started.
    ShardBegun {
        /// Shard key.
        shard_key: ShardKey,
        /// Database label.
        database: String,
    },
    /// Execute phase started.
    ExecuteStarted,
    /// The SQL unit executed on a shard.
    ShardExecuted {
        /// Shard key.
        shard_key: ShardKey,
    },
    /// A coordinator phase failed on a shard.
    ShardFailed {
        /// Shard key.
        shard_key: ShardKey,
        /// Failing phase.
        phase: CoordinatorPhase,
        /// Driver error text.
        error: String,
    },
    /// Finalize phase started.
    FinalizeStarted {
        /// True when every shard will be committed.
        commit: bool,
    },
    /// A shard committed.
    ShardCommitted {
        /// Shard key.
        shard_key: ShardKey,
    },
    /// A shard rolled back.
    ShardRolledBack {
        /// Shard key.
        shard_key: ShardKey,
    },
    /// A connection attempt failed and will be retried.
    ConnectRetry {
        /// Shard key.
        shard_key: ShardKey,
        /// Attempt number that failed (1-based).
        attempt: u32,
        /// Driver error text.
        error: String,
    },
    /// Releasing a connection failed.
    CloseFailed {
        /// Shard key.
        shard_key: ShardKey,
        /// Driver error text.
        error: String,
    },
    /// An apply call finished.
    ApplyFinished {
        /// Overall success flag.
        success: bool,
        /// Phase that aborted the call, if any.
        aborted_at: Option<CoordinatorPhase>,
    },
    /// A workload phase started.
    WorkloadStarted {
        /// Workload kind.
        workload: Workload,
        /// Operations scheduled.
        operations: usize,
        /// Worker count.
        concurrency: usize,
    },
    /// A benchmark operation failed.
    OperationFailed {
        /// Workload kind.
        workload: Workload,
        /// Routed shard, when routing succeeded.
        shard_key: Option<ShardKey>,
        /// Failure classification.
        kind: FailureKind,
        /// Failure detail.
        error: String,
    },
    /// A workload phase drained.
    WorkloadFinished {
        /// Workload kind.
        workload: Workload,
        /// Operations attempted.
        operations: usize,
        /// Operations that succeeded.
        successes: usize,
        /// Wall-clock duration in milliseconds.
        elapsed_ms: u128,
    },
}

/// Receiver of structured diagnostic events.
pub trait EventSink: Send + Sync {
    /// Records an event. Implementations must not panic or block indefinitely.
    fn record(&self, event: &GateEvent);
}
