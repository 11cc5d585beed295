// crates/shard-gate-cli/src/lib.rs
// ============================================================================
// Module: Shard Gate CLI Library
// Description: Shared helpers for the Shard Gate command-line interface.
// Purpose: Provide the message catalog and report rendering to the binary.
// Dependencies: serde, shard-gate-core
// ============================================================================

//! ## Overview
//! This library houses the CLI message catalog and the console/JSON report
//! rendering. The binary entry point (`src/main.rs`) imports these helpers so
//! all user-facing output goes through one place.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Message catalog and the `t!` macro.
pub mod i18n;
/// Live progress and summary rendering.
pub mod report;
