// crates/shard-gate-core/src/lib.rs
// ============================================================================
// Module: Shard Gate Core Library
// Description: Public API surface for the Shard Gate core.
// Purpose: Expose shard types, connection interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Shard Gate core coordinates SQL changes and synthetic load across a fixed
//! set of independently addressable database shards. It owns shard routing,
//! the best-effort two-phase apply across every shard, and the concurrent
//! insert/read harness. Database drivers plug in through the interfaces in
//! [`interfaces`]; the core never links a driver itself.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::ConnectPolicy;
pub use interfaces::ConnectionFactory;
pub use interfaces::EventSink;
pub use interfaces::GateEvent;
pub use interfaces::ShardConnection;
pub use interfaces::ShardDbError;
pub use interfaces::ShardRow;
pub use interfaces::SqlParam;
pub use runtime::FanoutEventSink;
pub use runtime::FileEventSink;
pub use runtime::IdRegistry;
pub use runtime::InMemoryShardCluster;
pub use runtime::LoadGenerator;
pub use runtime::NoopEventSink;
pub use runtime::RecordingEventSink;
pub use runtime::RouteError;
pub use runtime::ShardRouter;
pub use runtime::StderrEventSink;
pub use runtime::TransactionSession;
pub use runtime::TwoPhaseCoordinator;
