// crates/shard-gate-core/src/core/mod.rs
// ============================================================================
// Module: Shard Gate Core Types
// Description: Canonical shard, outcome, and metrics structures.
// Purpose: Provide stable, serializable types shared by every crate.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Core types describe the shard topology, the identifiers routed across it,
//! the outcome of a two-phase apply, and the metrics of a benchmark phase.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod metrics;
pub mod outcome;
pub mod shard_map;
pub mod statements;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::EntityId;
pub use identifiers::InvalidShardKey;
pub use identifiers::SHARD_KEY_COUNT;
pub use identifiers::ShardKey;
pub use metrics::BenchmarkMetrics;
pub use metrics::FailureKind;
pub use metrics::LatencySummary;
pub use metrics::OperationFailure;
pub use metrics::OperationResult;
pub use metrics::Workload;
pub use outcome::CoordinatorOutcome;
pub use outcome::CoordinatorPhase;
pub use outcome::PhaseError;
pub use outcome::ShardReport;
pub use outcome::ShardStatus;
pub use shard_map::DEFAULT_HOST;
pub use shard_map::DEFAULT_PORT;
pub use shard_map::ShardDescriptor;
pub use shard_map::ShardMap;
pub use shard_map::ShardMapError;
pub use statements::DEFAULT_TABLE;
pub use statements::SqlDialect;
pub use statements::WorkloadError;
pub use statements::WorkloadStatements;
pub use statements::validate_table_name;
