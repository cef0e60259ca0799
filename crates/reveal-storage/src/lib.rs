//! # Reveal Storage
//!
//! Local snapshot cache for reveal-sync sessions.
//!
//! The cache holds the last state this process has seen and when it was
//! obtained. It is consulted when the remote store is unreachable or the rate
//! budget is exhausted.
//!
//! ## Features
//!
//! - **SnapshotCache trait**: best-effort get/put of a [`CachedSnapshot`]
//! - **RedbSnapshotCache**: redb-backed cache that survives restarts
//! - **InMemorySnapshotCache**: process-local cache for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use reveal_core::SharedState;
//! use reveal_storage::{InMemorySnapshotCache, SnapshotCache};
//!
//! let cache = InMemorySnapshotCache::new();
//! cache.put(&SharedState::initial(0).with_guest("g1"), 1_000);
//!
//! let snapshot = cache.get().unwrap();
//! assert_eq!(snapshot.fetched_at, 1_000);
//! ```

pub mod error;
pub mod memory;
pub mod persistent;
pub mod tables;

// Re-exports
pub use error::StorageError;
pub use memory::InMemorySnapshotCache;
pub use persistent::RedbSnapshotCache;
pub use tables::{RedbStorage, RedbStorageConfig};

use reveal_core::{SharedState, Timestamp};

/// Cache key holding the serialized [`SharedState`]
pub const STATE_KEY: &str = "guestStateCached";

/// Cache key holding the fetch timestamp in epoch milliseconds
pub const TIMESTAMP_KEY: &str = "guestStateTimestamp";

/// The last known-good state and when it was stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
    /// The cached document
    pub state: SharedState,
    /// Epoch milliseconds at which the snapshot was stored
    pub fetched_at: Timestamp,
}

/// Best-effort local persistence of the last known state
///
/// Implementations never surface write failures: the caller still holds the
/// value it tried to store, which stays valid for the current session.
pub trait SnapshotCache: Send + Sync {
    /// Return the stored snapshot, if any
    fn get(&self) -> Option<CachedSnapshot>;

    /// Store `state`, overwriting any previous snapshot
    fn put(&self, state: &SharedState, fetched_at: Timestamp);

    /// Forget the stored snapshot
    fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the SnapshotCache trait is object-safe
    fn _assert_object_safe(_: &dyn SnapshotCache) {}

    #[test]
    fn test_cache_keys_are_distinct() {
        assert_ne!(STATE_KEY, TIMESTAMP_KEY);
    }
}
