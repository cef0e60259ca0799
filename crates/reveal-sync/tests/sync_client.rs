//! Integration tests for SyncClient against in-process remotes

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Barrier;

use reveal_core::{ManualClock, SharedState, admit_guest, reveal_name};
use reveal_storage::{InMemorySnapshotCache, RedbSnapshotCache, SnapshotCache};
use reveal_sync::{
    InMemoryRemoteStore, InjectedFailure, RateLimiter, RemoteStore, Result, StateOrigin,
    SyncClient,
};

fn client_for(remote: Arc<dyn RemoteStore>, clock: Arc<ManualClock>) -> SyncClient {
    SyncClient::with_clock(
        remote,
        Arc::new(InMemorySnapshotCache::new()),
        Arc::new(RateLimiter::new()),
        clock,
    )
}

#[tokio::test]
async fn test_end_to_end_check_in_then_reveal() {
    let clock = Arc::new(ManualClock::new(1_000));
    let remote = Arc::new(InMemoryRemoteStore::with_document(SharedState::initial(0)));
    let client = client_for(remote.clone(), clock.clone());

    client.mutate(admit_guest("g1")).await.unwrap();
    let state = client.load().await;
    assert_eq!(state.authenticated_guests.len(), 1);
    assert!(state.is_guest_authenticated(&"g1".into()));
    assert!(!state.is_name_revealed);

    clock.advance(1_000);
    client.mutate(reveal_name()).await.unwrap();
    let state = client.load().await;
    assert!(state.is_name_revealed);
    assert_eq!(state.authenticated_guests.len(), 1);
}

#[tokio::test]
async fn test_adding_same_guest_twice_is_idempotent() {
    let clock = Arc::new(ManualClock::new(1_000));
    let remote = Arc::new(InMemoryRemoteStore::with_document(SharedState::initial(0)));
    let client = client_for(remote.clone(), clock);

    client.mutate(admit_guest("g1")).await.unwrap();
    client.mutate(admit_guest("g1")).await.unwrap();

    let stored = remote.document().unwrap();
    assert_eq!(stored.authenticated_guests.len(), 1);
    assert_eq!(remote.put_calls(), 2);
}

#[tokio::test]
async fn test_written_versions_never_decrease() {
    // The clock runs backwards between writes; versions still advance.
    let clock = Arc::new(ManualClock::new(50_000));
    let remote = Arc::new(InMemoryRemoteStore::with_document(SharedState::initial(0)));
    let client = client_for(remote.clone(), clock.clone());

    for (i, now) in [50_000, 40_000, 60_000, 60_000, 10_000].into_iter().enumerate() {
        clock.set(now);
        client.mutate(admit_guest(format!("g{i}"))).await.unwrap();
    }

    let versions: Vec<_> = remote.writes().iter().map(|s| s.last_updated).collect();
    assert_eq!(versions.len(), 5);
    assert!(versions.windows(2).all(|w| w[0] < w[1]), "{versions:?}");
}

#[tokio::test]
async fn test_two_sessions_interleaved() {
    let remote = Arc::new(InMemoryRemoteStore::with_document(
        SharedState::initial(0).with_guest("A"),
    ));
    let alice = client_for(remote.clone(), Arc::new(ManualClock::new(1_000)));
    let bob = client_for(remote.clone(), Arc::new(ManualClock::new(2_000)));

    alice.admit_guest("B").await.unwrap();
    bob.admit_guest("C").await.unwrap();

    let stored = remote.document().unwrap();
    let guests: Vec<_> = stored
        .authenticated_guests
        .iter()
        .map(|g| g.as_str().to_string())
        .collect();
    assert_eq!(guests, vec!["A", "B", "C"]);
}

/// Remote whose first two fetches both observe the document before either
/// caller gets to write.
struct RacingRemote {
    document: Mutex<SharedState>,
    barrier: Barrier,
    gated: AtomicUsize,
    writes: Mutex<Vec<SharedState>>,
}

impl RacingRemote {
    fn new(initial: SharedState) -> Self {
        Self {
            document: Mutex::new(initial),
            barrier: Barrier::new(2),
            gated: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteStore for RacingRemote {
    async fn fetch_document(&self) -> Result<SharedState> {
        let snapshot = self.document.lock().clone();
        if self.gated.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        Ok(snapshot)
    }

    async fn put_document(&self, state: &SharedState) -> Result<()> {
        *self.document.lock() = state.clone();
        self.writes.lock().push(state.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_concurrent_mutations_lose_nothing() {
    let remote = Arc::new(RacingRemote::new(SharedState::initial(0).with_guest("A")));
    let client = client_for(remote.clone(), Arc::new(ManualClock::new(10_000)));

    let (first, second) = tokio::join!(
        client.mutate(admit_guest("B")),
        client.mutate(admit_guest("C")),
    );
    first.unwrap();
    second.unwrap();

    let stored = remote.document.lock().clone();
    for guest in ["A", "B", "C"] {
        assert!(stored.is_guest_authenticated(&guest.into()), "missing {guest}");
    }

    let versions: Vec<_> = remote.writes.lock().iter().map(|s| s.last_updated).collect();
    assert_eq!(versions.len(), 2);
    assert!(versions[0] <= versions[1]);

    let view = client.load().await;
    assert_eq!(view.revealed_count(), 3);
}

#[tokio::test]
async fn test_remote_failure_falls_back_to_cache() {
    let remote = Arc::new(InMemoryRemoteStore::with_document(
        SharedState::initial(100).with_guest("g1"),
    ));
    let client = client_for(remote.clone(), Arc::new(ManualClock::new(1_000)));

    let fresh = client.load().await;
    remote.fail_fetches(Some(InjectedFailure::Unavailable));
    let outcome = client.load_outcome().await;

    assert_eq!(outcome.origin, StateOrigin::Cache);
    assert_eq!(outcome.state, fresh);
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn test_exhausted_budget_makes_no_remote_call() {
    let clock = Arc::new(ManualClock::new(1_000));
    let remote = Arc::new(InMemoryRemoteStore::with_document(SharedState::initial(0)));
    let limiter = Arc::new(RateLimiter::new());
    let client = SyncClient::with_clock(
        remote.clone(),
        Arc::new(InMemorySnapshotCache::new()),
        limiter.clone(),
        clock.clone(),
    );

    limiter.record_response(0, 5_000);
    let state = client.load().await;

    assert_eq!(remote.fetch_calls(), 0);
    assert_eq!(state, SharedState::initial(1_000));

    clock.set(5_000);
    client.load().await;
    assert_eq!(remote.fetch_calls(), 1);
}

#[tokio::test]
async fn test_persistent_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.redb");
    let remote = Arc::new(InMemoryRemoteStore::with_document(SharedState::initial(0)));

    {
        let cache = Arc::new(RedbSnapshotCache::open(&path).unwrap());
        let client = SyncClient::with_clock(
            remote.clone(),
            cache,
            Arc::new(RateLimiter::new()),
            Arc::new(ManualClock::new(1_000)),
        );
        client.admit_guest("g1").await.unwrap();
    }

    remote.fail_fetches(Some(InjectedFailure::Unavailable));
    let cache = Arc::new(RedbSnapshotCache::open(&path).unwrap());
    assert!(cache.get().is_some());

    let client = SyncClient::with_clock(
        remote,
        cache,
        Arc::new(RateLimiter::new()),
        Arc::new(ManualClock::new(2_000)),
    );
    let outcome = client.load_outcome().await;

    assert_eq!(outcome.origin, StateOrigin::Cache);
    assert!(outcome.state.is_guest_authenticated(&"g1".into()));
}
