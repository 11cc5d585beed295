// crates/shard-gate-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Message catalog and translation helpers for the CLI.
// Purpose: Keep every user-facing string in one place.
// Dependencies: Standard library collections.
// ============================================================================

//! ## Overview
//! Every line the CLI prints is looked up in a static English catalog and
//! formatted through the [`t!`](crate::t) macro. Named `{placeholder}`
//! arguments are substituted in the order given.
//!
//! ## Invariants
//! - The catalog is built once and read-only thereafter.
//! - Missing keys fall back to the key itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries.
pub(crate) const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.version", "shard-gate {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("output.json_failed", "Failed to serialize JSON output: {error}"),
    ("input.read_failed", "Failed to read {kind} at {path}: {error}"),
    (
        "input.read_too_large",
        "Refusing to read {kind} at {path} because it is {size} bytes (limit {limit}).",
    ),
    ("input.not_utf8", "{kind} at {path} is not valid UTF-8."),
    ("input.kind.sql", "SQL file"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("mapping.load_failed", "Failed to load mapping file {path}: {error}"),
    ("events.open_failed", "Failed to open event log {path}: {error}"),
    ("apply.sql_empty", "SQL file {path} is empty; nothing to apply."),
    ("apply.header.title", "  CLI Tool: Apply SQL to All Shards"),
    ("apply.header.mapping", "Mapping file: {path}"),
    ("apply.header.sql", "SQL file: {path}"),
    ("apply.header.databases", "Databases: {count}"),
    ("apply.phase.begin", "--- Phase 1: BEGIN transactions ---"),
    ("apply.phase.execute", "--- Phase 2: EXECUTE SQL ---"),
    ("apply.phase.commit", "--- Phase 3: COMMIT ---"),
    ("apply.phase.rollback", "--- Phase 3: ROLLBACK ---"),
    ("apply.shard.begun", "  [{key}] Connected to {database} - BEGIN"),
    ("apply.shard.connect_failed", "  [{key}] Error connecting: {error}"),
    ("apply.shard.executed", "  [{key}] SQL executed successfully"),
    ("apply.shard.execute_failed", "  [{key}] ERROR: {error}"),
    ("apply.shard.committed", "  [{key}] COMMIT"),
    ("apply.shard.rolled_back", "  [{key}] ROLLBACK"),
    ("apply.shard.finalize_failed", "  [{key}] Error: {error}"),
    ("apply.shard.retry", "  [{key}] Connection attempt {attempt} failed, retrying: {error}"),
    ("apply.shard.close_failed", "  [{key}] Close failed: {error}"),
    ("apply.result", "  Result: {status}"),
    ("apply.result.success", "SUCCESS"),
    ("apply.result.failed", "FAILED"),
    ("benchmark.args_invalid", "Invalid benchmark settings: {error}"),
    ("benchmark.setup_failed", "Failed to prepare benchmark: {error}"),
    ("benchmark.header.title", "  CLI Tool: Benchmark"),
    ("benchmark.config.header", "Configuration:"),
    ("benchmark.config.inserts", "  - Inserts: {count}"),
    ("benchmark.config.reads", "  - Reads: {count}"),
    ("benchmark.config.concurrency", "  - Concurrency: {count}"),
    ("benchmark.config.shards", "  - Shards: {count}"),
    ("benchmark.config.driver", "  - Driver: {driver}"),
    ("benchmark.phase.insert", "--- INSERT Benchmark ---"),
    ("benchmark.phase.read", "--- READ Benchmark ---"),
    ("benchmark.metrics.total", "  Total: {count} operations"),
    ("benchmark.metrics.success", "  Success: {count}"),
    ("benchmark.metrics.failed", "  Failed ({kind}): {count}"),
    ("benchmark.metrics.duration", "  Duration: {seconds} seconds"),
    ("benchmark.metrics.throughput", "  Throughput: {ops} ops/sec"),
    (
        "benchmark.metrics.latency",
        "  Latency (ms): min {min}, p50 {p50}, p95 {p95}, p99 {p99}, max {max}",
    ),
    ("benchmark.summary.complete", "  BENCHMARK COMPLETE"),
    ("benchmark.summary.total_time", "  Total time: {seconds} seconds"),
    ("benchmark.summary.insert", "  INSERT: {ops} ops/sec"),
    ("benchmark.summary.read", "  READ: {ops} ops/sec"),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the English catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

/// Returns the static English catalog.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}
