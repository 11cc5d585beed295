// crates/shard-gate-store-postgres/src/lib.rs
// ============================================================================
// Module: Shard Gate Postgres Store
// Description: PostgreSQL connection factory for shard sessions.
// Purpose: Provide blocking, unpooled Postgres connections behind the core traits.
// Dependencies: postgres, shard-gate-core
// ============================================================================

//! ## Overview
//! [`PostgresShardFactory`] opens one `postgres::Client` per request. There
//! is no pool: each session owns its client and closes it when done.
//! Transactions are driven with explicit `BEGIN`/`COMMIT`/`ROLLBACK`
//! statements so the client never auto-commits inside a coordinator session.
//!
//! Benchmark tables may key rows on a `uuid` column or on a character column
//! holding the hyphenated form; the id parameter adapts to either.
//!
//! Security posture: connections use `NoTls`; deploy on a trusted network.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::PostgresShardFactory;
pub use store::client_config;
