// crates/shard-gate-core/src/core/outcome.rs
// ============================================================================
// Module: Coordinator Outcome
// Description: Per-shard status records produced by a two-phase apply.
// Purpose: Report exactly what happened on each shard, in shard-key order.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`CoordinatorOutcome`] is produced once per apply call and never mutated
//! afterwards. It lists one [`ShardReport`] for every shard that was
//! contacted, in ascending shard-key order, and the overall success flag.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::identifiers::ShardKey;

// ============================================================================
// SECTION: Phases
// ============================================================================

/// Coordinator phase labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorPhase {
    /// Open connections and start transactions.
    Begin,
    /// Run the SQL unit on every open transaction.
    Execute,
    /// Commit or roll back every transaction.
    Finalize,
}

impl CoordinatorPhase {
    /// Returns a stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Execute => "execute",
            Self::Finalize => "finalize",
        }
    }
}

/// Terminal status recorded for one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStatus {
    /// Transaction opened; the shard was not executed.
    Begun,
    /// SQL unit executed; not yet finalized.
    Executed,
    /// A phase failed on this shard.
    Failed,
    /// Transaction committed.
    Committed,
    /// Transaction rolled back.
    RolledBack,
}

impl ShardStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Begun => "begun",
            Self::Executed => "executed",
            Self::Failed => "failed",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Error captured for a shard during a specific phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseError {
    /// Phase in which the error occurred.
    pub phase: CoordinatorPhase,
    /// Driver error text.
    pub message: String,
}

/// Final record for one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardReport {
    /// Shard key.
    pub shard_key: ShardKey,
    /// Database label of the shard.
    pub database: String,
    /// Whether the SQL unit executed successfully on this shard.
    pub executed: bool,
    /// Terminal status.
    pub status: ShardStatus,
    /// First error captured for this shard, if any.
    pub error: Option<PhaseError>,
}

/// Result of one two-phase apply call.
///
/// # Invariants
/// - `success` is true iff every report is `Committed` with `executed` set.
/// - Reports are ordered by shard key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorOutcome {
    /// Per-shard reports in shard-key order.
    pub shards: Vec<ShardReport>,
    /// Phase whose failure ruled out a commit (`Begin` or `Execute`), if any.
    pub aborted_at: Option<CoordinatorPhase>,
    /// Overall success flag.
    pub success: bool,
}

impl CoordinatorOutcome {
    /// Returns the report for `key`, if that shard was contacted.
    #[must_use]
    pub fn shard(&self, key: ShardKey) -> Option<&ShardReport> {
        self.shards.iter().find(|report| report.shard_key == key)
    }

    /// Counts reports with the given status.
    #[must_use]
    pub fn count(&self, status: ShardStatus) -> usize {
        self.shards.iter().filter(|report| report.status == status).count()
    }
}
