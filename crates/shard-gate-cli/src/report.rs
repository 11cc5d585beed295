// crates/shard-gate-cli/src/report.rs
// ============================================================================
// Module: CLI Report Rendering
// Description: Human-readable and JSON renderings of apply and benchmark runs.
// Purpose: Print per-shard progress live and summarize finished runs.
// Dependencies: serde, shard-gate-core
// ============================================================================

//! ## Overview
//! [`ReportEmitter`] is an [`EventSink`] that turns coordinator and workload
//! events into console lines as they happen, so a slow shard is visible
//! while the run is still in progress. The free functions render the
//! headers and summaries printed before and after a run. JSON documents
//! replace all of this when `--format json` is selected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use serde::Serialize;
use shard_gate_core::BenchmarkMetrics;
use shard_gate_core::CoordinatorOutcome;
use shard_gate_core::CoordinatorPhase;
use shard_gate_core::EventSink;
use shard_gate_core::GateEvent;
use shard_gate_core::Workload;

use crate::t;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Width of the `=` rule framing headers and footers.
const RULE_WIDTH: usize = 60;

// ============================================================================
// SECTION: Live Emitter
// ============================================================================

/// Event sink that prints progress lines to a writer.
pub struct ReportEmitter<W> {
    /// Output writer.
    out: Mutex<W>,
}

impl ReportEmitter<io::Stdout> {
    /// Creates an emitter writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ReportEmitter<W> {
    /// Creates an emitter writing to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the emitter and returns its writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for ReportEmitter<W> {
    fn record(&self, event: &GateEvent) {
        let Some(line) = event_line(event) else {
            return;
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

/// Renders the console line for an event, if the event has one.
///
/// Phase banners start with a newline so they stand apart from the
/// preceding per-shard lines.
#[must_use]
pub fn event_line(event: &GateEvent) -> Option<String> {
    let line = match event {
        GateEvent::BeginStarted {
            ..
        } => format!("\n{}", t!("apply.phase.begin")),
        GateEvent::ShardBegun {
            shard_key,
            database,
        } => t!("apply.shard.begun", key = shard_key, database = database),
        GateEvent::ExecuteStarted => format!("\n{}", t!("apply.phase.execute")),
        GateEvent::ShardExecuted {
            shard_key,
        } => t!("apply.shard.executed", key = shard_key),
        GateEvent::ShardFailed {
            shard_key,
            phase,
            error,
        } => match phase {
            CoordinatorPhase::Begin => t!("apply.shard.connect_failed", key = shard_key, error = error),
            CoordinatorPhase::Execute => {
                t!("apply.shard.execute_failed", key = shard_key, error = error)
            }
            CoordinatorPhase::Finalize => {
                t!("apply.shard.finalize_failed", key = shard_key, error = error)
            }
        },
        GateEvent::FinalizeStarted {
            commit: true,
        } => format!("\n{}", t!("apply.phase.commit")),
        GateEvent::FinalizeStarted {
            commit: false,
        } => format!("\n{}", t!("apply.phase.rollback")),
        GateEvent::ShardCommitted {
            shard_key,
        } => t!("apply.shard.committed", key = shard_key),
        GateEvent::ShardRolledBack {
            shard_key,
        } => t!("apply.shard.rolled_back", key = shard_key),
        GateEvent::ConnectRetry {
            shard_key,
            attempt,
            error,
        } => t!("apply.shard.retry", key = shard_key, attempt = attempt, error = error),
        GateEvent::CloseFailed {
            shard_key,
            error,
        } => t!("apply.shard.close_failed", key = shard_key, error = error),
        GateEvent::WorkloadStarted {
            workload: Workload::Insert,
            ..
        } => format!("\n{}", t!("benchmark.phase.insert")),
        GateEvent::WorkloadStarted {
            workload: Workload::Read,
            ..
        } => format!("\n{}", t!("benchmark.phase.read")),
        GateEvent::ApplyFinished {
            ..
        }
        | GateEvent::OperationFailed {
            ..
        }
        | GateEvent::WorkloadFinished {
            ..
        } => return None,
    };
    Some(line)
}

// ============================================================================
// SECTION: Text Summaries
// ============================================================================

/// Returns the `=` rule.
fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Formats seconds with two decimals.
fn seconds(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64())
}

/// Formats milliseconds with two decimals.
fn millis(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64() * 1000.0)
}

/// Formats an ops/sec rate with one decimal.
fn rate(ops: f64) -> String {
    format!("{ops:.1}")
}

/// Lines printed before an apply run.
#[must_use]
pub fn apply_header(mapping: &Path, sql: &Path, databases: usize) -> Vec<String> {
    vec![
        String::new(),
        rule(),
        t!("apply.header.title"),
        rule(),
        String::new(),
        t!("apply.header.mapping", path = mapping.display()),
        t!("apply.header.sql", path = sql.display()),
        t!("apply.header.databases", count = databases),
    ]
}

/// Lines printed after an apply run.
#[must_use]
pub fn apply_footer(outcome: &CoordinatorOutcome) -> Vec<String> {
    let status =
        if outcome.success { t!("apply.result.success") } else { t!("apply.result.failed") };
    vec![String::new(), rule(), t!("apply.result", status = status), rule()]
}

/// Benchmark settings echoed before the first phase.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSettings {
    /// Driver label.
    pub driver: String,
    /// Insert operations.
    pub inserts: usize,
    /// Read operations.
    pub reads: usize,
    /// Worker count.
    pub concurrency: usize,
    /// Distinct shard descriptors in the mapping.
    pub shards: usize,
}

/// Lines printed before a benchmark run.
#[must_use]
pub fn benchmark_header(settings: &BenchmarkSettings) -> Vec<String> {
    vec![
        String::new(),
        rule(),
        t!("benchmark.header.title"),
        rule(),
        String::new(),
        t!("benchmark.config.header"),
        t!("benchmark.config.inserts", count = settings.inserts),
        t!("benchmark.config.reads", count = settings.reads),
        t!("benchmark.config.concurrency", count = settings.concurrency),
        t!("benchmark.config.shards", count = settings.shards),
        t!("benchmark.config.driver", driver = settings.driver),
    ]
}

/// Lines printed after one benchmark phase drains.
#[must_use]
pub fn phase_lines(metrics: &BenchmarkMetrics) -> Vec<String> {
    let mut lines = vec![
        t!("benchmark.metrics.total", count = metrics.operations),
        t!("benchmark.metrics.success", count = metrics.successes),
    ];
    for (kind, count) in &metrics.failures {
        lines.push(t!("benchmark.metrics.failed", kind = kind.as_str(), count = count));
    }
    lines.push(t!("benchmark.metrics.duration", seconds = seconds(metrics.elapsed)));
    lines.push(t!("benchmark.metrics.throughput", ops = rate(metrics.throughput)));
    let latency = &metrics.latency;
    lines.push(t!(
        "benchmark.metrics.latency",
        min = millis(latency.min),
        p50 = millis(latency.p50),
        p95 = millis(latency.p95),
        p99 = millis(latency.p99),
        max = millis(latency.max)
    ));
    lines
}

/// Lines printed after both benchmark phases.
#[must_use]
pub fn benchmark_summary(insert: &BenchmarkMetrics, read: &BenchmarkMetrics) -> Vec<String> {
    vec![
        String::new(),
        rule(),
        t!("benchmark.summary.complete"),
        t!("benchmark.summary.total_time", seconds = seconds(insert.elapsed + read.elapsed)),
        t!("benchmark.summary.insert", ops = rate(insert.throughput)),
        t!("benchmark.summary.read", ops = rate(read.throughput)),
        rule(),
    ]
}

// ============================================================================
// SECTION: JSON Documents
// ============================================================================

/// JSON output of `apply-sql`.
#[derive(Serialize)]
pub struct ApplyDocument<'a> {
    /// Mapping file path.
    pub mapping: String,
    /// SQL file path.
    pub sql_file: String,
    /// Number of mapped shards.
    pub databases: usize,
    /// Coordinator outcome.
    pub outcome: &'a CoordinatorOutcome,
}

/// JSON output of `benchmark`.
#[derive(Serialize)]
pub struct BenchmarkDocument<'a> {
    /// Echoed settings.
    pub settings: &'a BenchmarkSettings,
    /// Insert phase metrics.
    pub insert: &'a BenchmarkMetrics,
    /// Read phase metrics.
    pub read: &'a BenchmarkMetrics,
    /// Combined wall-clock time in milliseconds.
    pub total_elapsed_ms: u128,
}
