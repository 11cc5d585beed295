// crates/shard-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Shard Gate SQLite Store
// Description: SQLite connection factory for shard sessions.
// Purpose: Run coordinator and benchmark workloads against local shard files.
// Dependencies: rusqlite, shard-gate-core
// ============================================================================

//! ## Overview
//! Each shard is a `SQLite` database file named by the descriptor's
//! `Database` field. Host, port, and credentials are ignored. This backend
//! serves local development and end-to-end tests without a server.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::DEFAULT_BUSY_TIMEOUT_MS;
pub use store::SqliteShardFactory;
