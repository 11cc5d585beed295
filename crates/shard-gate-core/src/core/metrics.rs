// crates/shard-gate-core/src/core/metrics.rs
// ============================================================================
// Module: Benchmark Metrics
// Description: Per-operation results and per-phase aggregate metrics.
// Purpose: Summarize load-generator phases without aborting on failures.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every load-generator operation yields `Result<(), OperationFailure>`. The
//! pool driver records each result with its latency and folds them into
//! [`BenchmarkMetrics`] once the phase has fully drained.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Operation Results
// ============================================================================

/// Load-generator workload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    /// Insert synthetic records.
    Insert,
    /// Read previously inserted records.
    Read,
}

impl Workload {
    /// Returns a stable label for the workload.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Read => "read",
        }
    }
}

/// Classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection to the shard could not be established.
    Connection,
    /// A statement or transaction call failed.
    Execution,
    /// The read returned no row.
    NotFound,
    /// No identifiers were available to read.
    RegistryEmpty,
    /// The routed shard key has no mapping entry.
    UnmappedShard,
    /// The operation panicked before returning.
    Panicked,
}

impl FailureKind {
    /// Returns a stable label for the failure kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Execution => "execution",
            Self::NotFound => "not_found",
            Self::RegistryEmpty => "registry_empty",
            Self::UnmappedShard => "unmapped_shard",
            Self::Panicked => "panicked",
        }
    }
}

/// Failure of a single load-generator operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{} failure: {message}", .kind.as_str())]
pub struct OperationFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Failure detail.
    pub message: String,
}

impl OperationFailure {
    /// Creates a new failure record.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result of one load-generator operation.
pub type OperationResult = Result<(), OperationFailure>;

// ============================================================================
// SECTION: Latency
// ============================================================================

/// Latency distribution over one phase.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LatencySummary {
    /// Fastest operation.
    pub min: Duration,
    /// Arithmetic mean.
    pub mean: Duration,
    /// Median.
    pub p50: Duration,
    /// 95th percentile.
    pub p95: Duration,
    /// 99th percentile.
    pub p99: Duration,
    /// Slowest operation.
    pub max: Duration,
}

impl LatencySummary {
    /// Summarizes a set of latencies (all zero when empty).
    #[must_use]
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let total: Duration = sorted.iter().sum();
        let count = u32::try_from(sorted.len()).unwrap_or(u32::MAX);
        Self {
            min: sorted[0],
            mean: total / count,
            p50: percentile(&sorted, 50),
            p95: percentile(&sorted, 95),
            p99: percentile(&sorted, 99),
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Nearest-rank percentile over a sorted, non-empty slice.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

// ============================================================================
// SECTION: Phase Metrics
// ============================================================================

/// Aggregate metrics for one completed workload phase.
///
/// # Invariants
/// - `successes + failures.values().sum() == operations`.
/// - Computed only after every operation in the phase has finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkMetrics {
    /// Workload kind.
    pub workload: Workload,
    /// Operations attempted.
    pub operations: usize,
    /// Operations that succeeded.
    pub successes: usize,
    /// Failed operations by kind.
    pub failures: BTreeMap<FailureKind, usize>,
    /// Wall-clock duration of the phase.
    pub elapsed: Duration,
    /// Operations per second (`operations / elapsed`).
    pub throughput: f64,
    /// Per-operation latency distribution.
    pub latency: LatencySummary,
}

impl BenchmarkMetrics {
    /// Folds per-operation results into phase metrics.
    #[must_use]
    pub fn from_results(
        workload: Workload,
        results: &[(Duration, OperationResult)],
        elapsed: Duration,
    ) -> Self {
        let mut successes = 0;
        let mut failures = BTreeMap::new();
        let mut latencies = Vec::with_capacity(results.len());
        for (latency, result) in results {
            latencies.push(*latency);
            match result {
                Ok(()) => successes += 1,
                Err(failure) => *failures.entry(failure.kind).or_insert(0) += 1,
            }
        }
        Self {
            workload,
            operations: results.len(),
            successes,
            failures,
            elapsed,
            throughput: throughput(results.len(), elapsed),
            latency: LatencySummary::from_samples(&latencies),
        }
    }

    /// Total failed operations.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

/// Computes operations per second, guarding against a zero-length phase.
#[allow(clippy::cast_precision_loss, reason = "Throughput is a reporting estimate.")]
fn throughput(operations: usize, elapsed: Duration) -> f64 {
    if operations == 0 {
        return 0.0;
    }
    let seconds = elapsed.as_secs_f64().max(1e-6);
    operations as f64 / seconds
}
