// crates/shard-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Shard Gate Runtime
// Description: Routing, coordination, load generation, and event sinks.
// Purpose: Execute applies and benchmarks against the connection interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime components are synchronous and driver-agnostic. They borrow a
//! [`crate::interfaces::ConnectionFactory`] and an
//! [`crate::interfaces::EventSink`] and never hold connections past the call
//! that opened them.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod coordinator;
pub mod events;
pub mod load;
pub mod memory;
pub mod registry;
pub mod router;
pub mod session;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use coordinator::TwoPhaseCoordinator;
pub use events::FanoutEventSink;
pub use events::FileEventSink;
pub use events::NoopEventSink;
pub use events::RecordingEventSink;
pub use events::StderrEventSink;
pub use load::LoadGenerator;
pub use memory::InMemoryShardCluster;
pub use registry::IdRegistry;
pub use router::RouteError;
pub use router::ShardRouter;
pub use session::TransactionSession;
