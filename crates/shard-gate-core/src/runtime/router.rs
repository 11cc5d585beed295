// crates/shard-gate-core/src/runtime/router.rs
// ============================================================================
// Module: Shard Router
// Description: Deterministic identifier-to-shard-key routing.
// Purpose: Agree on record placement between insert and later lookups.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Routing is a pure function of an identifier's text: drop `-`
//! separators, lower-case, and take the final hex character. The same id
//! always yields the same key regardless of process, time, or call order.
//! Input whose final character is not a hex digit is rejected rather than
//! mapped to a default shard.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::EntityId;
use crate::core::ShardKey;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Routing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The identifier does not end in a hex digit.
    #[error("invalid identifier for routing: {0:?}")]
    InvalidIdentifier(String),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Stateless shard router.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardRouter;

impl ShardRouter {
    /// Routes a textual identifier to its shard key.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidIdentifier`] when the identifier is empty
    /// after stripping separators or its final character is not hex.
    pub fn route_text(self, id: &str) -> Result<ShardKey, RouteError> {
        id.chars()
            .rev()
            .find(|ch| *ch != '-')
            .and_then(ShardKey::from_char)
            .ok_or_else(|| RouteError::InvalidIdentifier(id.to_string()))
    }

    /// Routes an entity identifier to its shard key.
    ///
    /// The final hex character of a UUID is the low nibble of its last byte,
    /// so this agrees with [`ShardRouter::route_text`] on the rendered id.
    #[must_use]
    pub const fn route(self, id: &EntityId) -> ShardKey {
        ShardKey::from_nibble(id.as_uuid().as_bytes()[15])
    }
}
