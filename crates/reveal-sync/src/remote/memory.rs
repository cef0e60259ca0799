//! In-process remote store for tests and local runs

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reveal_core::{SharedState, Timestamp};

use super::RemoteStore;
use crate::error::{Result, SyncError};

/// Failure an [`InMemoryRemoteStore`] can be told to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Unavailable,
    RateLimited { reset_at: Timestamp },
    CredentialMissing,
}

impl InjectedFailure {
    fn to_error(self) -> SyncError {
        match self {
            Self::Unavailable => SyncError::unavailable("injected failure"),
            Self::RateLimited { reset_at } => SyncError::RateLimited { reset_at },
            Self::CredentialMissing => SyncError::CredentialMissing,
        }
    }
}

/// [`RemoteStore`] holding the document in memory
///
/// Counts calls and keeps every successfully written version so tests can
/// check what reached the "remote".
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    document: Mutex<Option<SharedState>>,
    writes: Mutex<Vec<SharedState>>,
    fetch_failure: Mutex<Option<InjectedFailure>>,
    put_failure: Mutex<Option<InjectedFailure>>,
    fetch_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self {
            document: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            fetch_failure: Mutex::new(None),
            put_failure: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
        }
    }
}

impl InMemoryRemoteStore {
    /// Store with no document; fetches fail until one is written
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `state`
    pub fn with_document(state: SharedState) -> Self {
        let store = Self::default();
        *store.document.lock() = Some(state);
        store
    }

    /// Current document
    pub fn document(&self) -> Option<SharedState> {
        self.document.lock().clone()
    }

    /// Overwrite the document without counting a write
    pub fn set_document(&self, state: SharedState) {
        *self.document.lock() = Some(state);
    }

    /// Every document accepted by `put_document`, in order
    pub fn writes(&self) -> Vec<SharedState> {
        self.writes.lock().clone()
    }

    /// Make fetches fail (or succeed again with `None`)
    pub fn fail_fetches(&self, failure: Option<InjectedFailure>) {
        *self.fetch_failure.lock() = failure;
    }

    /// Make writes fail (or succeed again with `None`)
    pub fn fail_puts(&self, failure: Option<InjectedFailure>) {
        *self.put_failure.lock() = failure;
    }

    /// Number of fetch attempts, failed ones included
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of write attempts, failed ones included
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn fetch_document(&self) -> Result<SharedState> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.fetch_failure.lock() {
            return Err(failure.to_error());
        }
        self.document
            .lock()
            .clone()
            .ok_or_else(|| SyncError::unavailable("document not found"))
    }

    async fn put_document(&self, state: &SharedState) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.put_failure.lock() {
            return Err(failure.to_error());
        }
        *self.document.lock() = Some(state.clone());
        self.writes.lock().push(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_is_unavailable() {
        let store = InMemoryRemoteStore::new();
        assert!(matches!(
            store.fetch_document().await,
            Err(SyncError::RemoteUnavailable(_))
        ));
        assert_eq!(store.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_put_then_fetch() {
        let store = InMemoryRemoteStore::new();
        let state = SharedState::initial(1).with_guest("g1");

        store.put_document(&state).await.unwrap();

        assert_eq!(store.fetch_document().await.unwrap(), state);
        assert_eq!(store.writes(), vec![state]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryRemoteStore::with_document(SharedState::initial(1));
        store.fail_fetches(Some(InjectedFailure::RateLimited { reset_at: 9 }));
        store.fail_puts(Some(InjectedFailure::CredentialMissing));

        assert!(matches!(
            store.fetch_document().await,
            Err(SyncError::RateLimited { reset_at: 9 })
        ));
        assert!(matches!(
            store.put_document(&SharedState::initial(2)).await,
            Err(SyncError::CredentialMissing)
        ));
        assert!(store.writes().is_empty());
        assert_eq!(store.document().unwrap().last_updated, 1);

        store.fail_fetches(None);
        assert!(store.fetch_document().await.is_ok());
    }
}
