// crates/shard-gate-core/src/runtime/registry.rs
// ============================================================================
// Module: Identifier Registry
// Description: Shared, lock-guarded list of committed entity identifiers.
// Purpose: Hand ids from the insert phase to the read phase safely.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! The registry holds ids whose insert transaction committed. Appends and
//! random picks go through one mutex, so a reader never observes a
//! half-updated list. Poisoned locks are recovered: the list is append-only
//! and stays valid even if a holder panicked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::PoisonError;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::core::EntityId;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Append-only registry of committed entity identifiers.
#[derive(Debug, Default)]
pub struct IdRegistry {
    /// Committed ids in append order.
    ids: Mutex<Vec<EntityId>>,
}

impl IdRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed id.
    pub fn push(&self, id: EntityId) {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).push(id);
    }

    /// Picks one id uniformly at random, or `None` when empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<EntityId> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).choose(rng).copied()
    }

    /// Returns the number of registered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no id has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of every registered id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EntityId> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::IdRegistry;
    use crate::core::EntityId;

    #[test]
    fn pick_on_empty_registry_is_none() {
        let registry = IdRegistry::new();
        assert!(registry.pick(&mut rand::thread_rng()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_pushes_are_all_kept() {
        let registry = Arc::new(IdRegistry::new());
        let handles: Vec<_> = (0 .. 8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0 .. 50 {
                        registry.push(EntityId::random());
                    }
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().is_ok());
        }
        assert_eq!(registry.len(), 400);
        let picked = registry.pick(&mut rand::thread_rng());
        assert!(picked.is_some_and(|id| registry.snapshot().contains(&id)));
    }
}
