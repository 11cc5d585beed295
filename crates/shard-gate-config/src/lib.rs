// crates/shard-gate-config/src/lib.rs
// ============================================================================
// Module: Shard Gate Config Library
// Description: Canonical config model, validation, and mapping loader.
// Purpose: Single source of truth for shard-gate.toml and mapping semantics.
// Dependencies: shard-gate-core, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! `shard-gate-config` loads the optional `shard-gate.toml` tool
//! configuration and the JSON shard mapping file. Both loaders enforce size
//! and path limits and validate after parsing.
//!
//! Security posture: config and mapping inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod mapping;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use mapping::load_shard_map;
pub use mapping::parse_shard_map;
