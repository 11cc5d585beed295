// crates/shard-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Shard Gate Identifiers
// Description: Shard keys and entity identifiers used for routing.
// Purpose: Provide strongly typed identifiers with stable textual forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! A [`ShardKey`] is one of the sixteen lower-case hexadecimal characters
//! `0`-`9`, `a`-`f`. An [`EntityId`] is a 128-bit record identifier whose
//! final hex digit selects the owning shard. Both render in canonical
//! lower-case form so routing agrees across processes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use uuid::Uuid;

// ============================================================================
// SECTION: Shard Key
// ============================================================================

/// Number of distinct shard keys.
pub const SHARD_KEY_COUNT: usize = 16;

/// Single-character shard selector.
///
/// # Invariants
/// - The wrapped value is always in `0..16`.
/// - Ordering follows the hex digit value (`0 < 9 < a < f`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardKey(u8);

impl ShardKey {
    /// Creates a shard key from its numeric value (returns `None` above 15).
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if (index as usize) < SHARD_KEY_COUNT { Some(Self(index)) } else { None }
    }

    /// Creates a shard key from the low four bits of `byte`.
    #[must_use]
    pub const fn from_nibble(byte: u8) -> Self {
        Self(byte & 0x0f)
    }

    /// Creates a shard key from a hex character, accepting either case.
    #[must_use]
    pub fn from_char(value: char) -> Option<Self> {
        let digit = value.to_digit(16)?;
        u8::try_from(digit).ok().and_then(Self::from_index)
    }

    /// Parses a one-character shard key string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidShardKey`] when the input is not exactly one hex character.
    pub fn parse(value: &str) -> Result<Self, InvalidShardKey> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Self::from_char(ch).ok_or_else(|| InvalidShardKey(value.to_string())),
            _ => Err(InvalidShardKey(value.to_string())),
        }
    }

    /// Returns the numeric value of the key.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Returns the canonical lower-case character for the key.
    #[must_use]
    pub fn as_char(self) -> char {
        char::from_digit(u32::from(self.0), 16).unwrap_or('0')
    }

    /// Iterates every shard key in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0 .. 16u8).map(Self)
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for ShardKey {
    type Err = InvalidShardKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for ShardKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShardKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Rejected shard key input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid shard key: {0:?} (expected one of 0-9, a-f)")]
pub struct InvalidShardKey(pub String);

// ============================================================================
// SECTION: Entity Identifier
// ============================================================================

/// Identifier of a record placed by the load generator.
///
/// # Invariants
/// - Displays as the canonical lower-case hyphenated UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Generates a fresh random (v4) identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the first eight hex characters, used for synthetic titles.
    #[must_use]
    pub fn short(&self) -> String {
        self.to_string().chars().take(8).collect()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}
