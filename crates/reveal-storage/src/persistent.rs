//! redb-backed snapshot cache
//!
//! Stores the snapshot under two keys of the [`LOCAL_CACHE`] table:
//! [`STATE_KEY`] holds the JSON document and [`TIMESTAMP_KEY`] the fetch time
//! as a decimal string. Both keys are written in a single transaction.

use std::path::PathBuf;

use reveal_core::{SharedState, Timestamp};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::tables::{LOCAL_CACHE, RedbStorage, RedbStorageConfig};
use crate::{CachedSnapshot, STATE_KEY, SnapshotCache, TIMESTAMP_KEY};

/// Persistent implementation of [`SnapshotCache`]
pub struct RedbSnapshotCache {
    storage: RedbStorage,
}

impl RedbSnapshotCache {
    /// Open (or create) the cache database at `db_path`
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let storage = RedbStorage::open(RedbStorageConfig {
            db_path: db_path.into(),
        })?;
        Ok(Self { storage })
    }

    /// Wrap an already opened storage manager
    pub fn from_storage(storage: RedbStorage) -> Self {
        Self { storage }
    }

    fn read(&self) -> Result<Option<CachedSnapshot>, StorageError> {
        let Some(raw_state) = self.storage.get(LOCAL_CACHE, STATE_KEY)? else {
            return Ok(None);
        };

        let state = SharedState::from_json(&raw_state)
            .map_err(|e| StorageError::deserialization(e.to_string()))?;

        // A missing or garbled timestamp does not invalidate the state itself
        let fetched_at = self
            .storage
            .get(LOCAL_CACHE, TIMESTAMP_KEY)?
            .and_then(|raw| raw.parse::<Timestamp>().ok())
            .unwrap_or(0);

        Ok(Some(CachedSnapshot { state, fetched_at }))
    }

    fn write(&self, state: &SharedState, fetched_at: Timestamp) -> Result<(), StorageError> {
        let encoded = state
            .to_json()
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        let fetched_at = fetched_at.to_string();

        self.storage.put_all(
            LOCAL_CACHE,
            &[(STATE_KEY, encoded.as_str()), (TIMESTAMP_KEY, fetched_at.as_str())],
        )
    }
}

impl SnapshotCache for RedbSnapshotCache {
    fn get(&self) -> Option<CachedSnapshot> {
        match self.read() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Cached snapshot unreadable, treating as absent");
                None
            }
        }
    }

    fn put(&self, state: &SharedState, fetched_at: Timestamp) {
        match self.write(state, fetched_at) {
            Ok(()) => debug!(version = state.last_updated, "Cached snapshot"),
            Err(e) => warn!(error = %e, "Failed to persist snapshot, keeping in-memory value only"),
        }
    }

    fn clear(&self) {
        for key in [STATE_KEY, TIMESTAMP_KEY] {
            if let Err(e) = self.storage.delete(LOCAL_CACHE, key) {
                warn!(error = %e, key, "Failed to clear cache entry");
            }
        }
    }
}
