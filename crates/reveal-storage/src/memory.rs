//! In-memory snapshot cache
//!
//! Suitable for tests and for sessions that do not need the snapshot to
//! survive a restart.

use parking_lot::RwLock;
use reveal_core::{SharedState, Timestamp};
use tracing::trace;

use crate::{CachedSnapshot, SnapshotCache};

/// Process-local implementation of [`SnapshotCache`]
#[derive(Debug, Default)]
pub struct InMemorySnapshotCache {
    snapshot: RwLock<Option<CachedSnapshot>>,
}

impl InMemorySnapshotCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache pre-seeded with a snapshot
    pub fn with_snapshot(state: SharedState, fetched_at: Timestamp) -> Self {
        Self {
            snapshot: RwLock::new(Some(CachedSnapshot { state, fetched_at })),
        }
    }
}

impl SnapshotCache for InMemorySnapshotCache {
    fn get(&self) -> Option<CachedSnapshot> {
        self.snapshot.read().clone()
    }

    fn put(&self, state: &SharedState, fetched_at: Timestamp) {
        trace!(version = state.last_updated, "Caching snapshot in memory");
        *self.snapshot.write() = Some(CachedSnapshot {
            state: state.clone(),
            fetched_at,
        });
    }

    fn clear(&self) {
        *self.snapshot.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache() {
        let cache = InMemorySnapshotCache::new();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let cache = InMemorySnapshotCache::new();

        cache.put(&SharedState::initial(1).with_guest("a"), 10);
        cache.put(&SharedState::initial(2).with_guest("b"), 20);

        let snapshot = cache.get().unwrap();
        assert_eq!(snapshot.fetched_at, 20);
        assert_eq!(snapshot.state, SharedState::initial(2).with_guest("b"));
    }

    #[test]
    fn test_seeded_and_clear() {
        let cache = InMemorySnapshotCache::with_snapshot(SharedState::initial(5), 6);
        assert_eq!(cache.get().unwrap().fetched_at, 6);

        cache.clear();
        assert!(cache.get().is_none());
    }
}
