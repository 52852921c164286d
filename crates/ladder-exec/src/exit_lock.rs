//! Atomic per-position exit lock.
//!
//! Two concurrent triggers (a price-tick handler and a fill event, say)
//! must never both run the exit flow for the same position. The lock is a
//! position-keyed map; the guard releases on drop, so the release is
//! scope-guaranteed on both the success and failure path.

use dashmap::DashMap;
use tracing::trace;

/// Position-keyed exit lock map.
#[derive(Default)]
pub struct ExitLockMap {
    inflight: DashMap<String, ()>,
}

impl ExitLockMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the exit lock for a position.
    ///
    /// Returns `None` when another exit flow is already in progress; the
    /// caller must not proceed independently.
    #[must_use]
    pub fn try_acquire(&self, position_id: &str) -> Option<ExitGuard<'_>> {
        use dashmap::mapref::entry::Entry;

        match self.inflight.entry(position_id.to_string()) {
            Entry::Occupied(_) => {
                trace!(position_id, "Exit lock already held");
                None
            }
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(ExitGuard {
                    map: &self.inflight,
                    position_id: position_id.to_string(),
                })
            }
        }
    }

    /// Whether an exit is currently in flight for the position.
    #[must_use]
    pub fn is_locked(&self, position_id: &str) -> bool {
        self.inflight.contains_key(position_id)
    }

    /// Number of in-flight exits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

/// RAII guard for one position's exit lock. Releases on drop.
pub struct ExitGuard<'a> {
    map: &'a DashMap<String, ()>,
    position_id: String,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.position_id);
        trace!(position_id = %self.position_id, "Exit lock released");
    }
}
