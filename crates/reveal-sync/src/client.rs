//! Sync client: load, read-modify-write and subscription over one document
//!
//! The client composes the remote adapter, the local snapshot cache and the
//! rate limiter. Its view of the document is the join of what the remote last
//! returned and what this process has cached, so an edit made by this session
//! stays visible until the remote catches up with it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reveal_core::{Clock, GuestId, SharedState, SystemClock, Timestamp};
use reveal_storage::{CachedSnapshot, SnapshotCache};
use tracing::{debug, instrument, warn};

use crate::error::{Result, SyncError};
use crate::poller::{Poller, Subscription};
use crate::rate_limit::RateLimiter;
use crate::remote::RemoteStore;

/// Default polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Where the state returned by a load came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOrigin {
    /// Fresh from the remote store (joined with the local cache)
    Remote,
    /// The local snapshot, because the remote was skipped or failed
    Cache,
    /// Neither remote nor cache had anything
    Default,
}

/// Result of [`SyncClient::load_outcome`]
#[derive(Debug)]
pub struct LoadOutcome {
    /// Best-effort state
    pub state: SharedState,
    /// Where `state` came from
    pub origin: StateOrigin,
    /// The remote failure that forced a fallback, if any
    pub error: Option<SyncError>,
}

impl LoadOutcome {
    /// Whether the remote answered
    pub fn is_fresh(&self) -> bool {
        self.origin == StateOrigin::Remote
    }
}

/// Handle to the shared document
///
/// Cheap to clone; clones share the cache, rate limiter and remote.
#[derive(Clone)]
pub struct SyncClient {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn SnapshotCache>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    // Serializes read-join-write of the cache so concurrent mutations and
    // polls within this process never drop each other's state.
    cache_lock: Arc<Mutex<()>>,
    poll_interval: Duration,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("limiter", &self.limiter)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl SyncClient {
    /// Create a client using the system clock
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn SnapshotCache>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self::with_clock(remote, cache, limiter, Arc::new(SystemClock))
    }

    /// Create a client with an injected clock
    pub fn with_clock(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn SnapshotCache>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            remote,
            cache,
            limiter,
            clock,
            cache_lock: Arc::new(Mutex::new(())),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the interval used by [`SyncClient::subscribe`]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The shared rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The configured polling interval
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    /// Load the current state, never failing.
    ///
    /// Skips the remote while the rate budget is exhausted. Remote failures
    /// fall back to the cache, then to [`SharedState::initial`].
    pub async fn load(&self) -> SharedState {
        self.load_outcome().await.state
    }

    /// Like [`SyncClient::load`], but also reports where the state came from
    /// and the error that was swallowed.
    #[instrument(skip(self))]
    pub async fn load_outcome(&self) -> LoadOutcome {
        let now = self.now();
        if self.limiter.should_skip(now) {
            let reset_at = self.limiter.status().reset_at;
            return self.fallback(SyncError::RateLimited { reset_at });
        }

        match self.remote.fetch_document().await {
            Ok(remote) => {
                let state = self.remember(&remote);
                debug!(version = state.last_updated, "Loaded remote state");
                LoadOutcome {
                    state,
                    origin: StateOrigin::Remote,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Remote load failed, falling back to cache");
                self.fallback(e)
            }
        }
    }

    /// The cached snapshot, without touching the remote
    pub fn cached(&self) -> Result<CachedSnapshot> {
        self.cache.get().ok_or(SyncError::CacheMiss)
    }

    /// Read-modify-write of the shared document.
    ///
    /// `transform` must be a merge (union/OR); it receives the freshest state
    /// this session knows. The result is stamped with a version strictly
    /// greater than the one it was built from, cached locally and written to
    /// the remote. The local cache keeps the candidate even when the write
    /// fails, and the failure is returned.
    ///
    /// Returns the session view after the write.
    #[instrument(skip(self, transform))]
    pub async fn mutate<F>(&self, transform: F) -> Result<SharedState>
    where
        F: FnOnce(SharedState) -> SharedState,
    {
        let base = self.current_base().await;
        let candidate = transform(base.clone());
        self.commit(&base, candidate).await
    }

    /// Check a guest in. Performs no write if the guest is already present.
    pub async fn admit_guest(&self, guest: impl Into<GuestId>) -> Result<SharedState> {
        let guest = guest.into();
        let base = self.current_base().await;
        if base.is_guest_authenticated(&guest) {
            debug!(%guest, "Guest already checked in");
            return Ok(base);
        }
        let candidate = base.clone().with_guest(guest);
        self.commit(&base, candidate).await
    }

    /// Reveal the name. Performs no write if it is already revealed.
    pub async fn reveal_name(&self) -> Result<SharedState> {
        let base = self.current_base().await;
        if base.is_name_revealed {
            return Ok(base);
        }
        let candidate = base.clone().with_name_revealed();
        self.commit(&base, candidate).await
    }

    /// Poll the document every [`SyncClient::poll_interval`] and call
    /// `on_change` whenever a newer version is seen.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(SharedState) + Send + Sync + 'static,
    {
        self.subscribe_every(self.poll_interval, on_change)
    }

    /// Like [`SyncClient::subscribe`] with an explicit interval
    pub fn subscribe_every<F>(&self, interval: Duration, on_change: F) -> Subscription
    where
        F: Fn(SharedState) + Send + Sync + 'static,
    {
        Poller::spawn(self.clone(), interval, on_change)
    }

    async fn current_base(&self) -> SharedState {
        let loaded = self.load().await;
        match self.cache.get() {
            Some(snapshot) => loaded.join(&snapshot.state),
            None => loaded,
        }
    }

    async fn commit(&self, base: &SharedState, mut candidate: SharedState) -> Result<SharedState> {
        let now = self.now();
        candidate.last_updated = now.max(base.last_updated.saturating_add(1));

        // Make the intent visible to the rest of this session before the
        // write goes out, whatever its outcome.
        let view = self.remember(&candidate);

        if self.limiter.should_skip(now) {
            let reset_at = self.limiter.status().reset_at;
            warn!(reset_at, "Rate budget exhausted, write kept locally");
            return Err(SyncError::RateLimited { reset_at });
        }

        match self.remote.put_document(&candidate).await {
            Ok(()) => {
                debug!(version = candidate.last_updated, "Wrote state");
                Ok(view)
            }
            Err(e) => {
                warn!(error = %e, "Write failed, change kept locally");
                Err(e)
            }
        }
    }

    /// Join `state` into the cache and return the joined view.
    fn remember(&self, state: &SharedState) -> SharedState {
        let _guard = self.cache_lock.lock();
        let joined = match self.cache.get() {
            Some(snapshot) => state.join(&snapshot.state),
            None => state.clone(),
        };
        self.cache.put(&joined, self.now());
        joined
    }

    fn fallback(&self, error: SyncError) -> LoadOutcome {
        match self.cache.get() {
            Some(snapshot) => {
                debug!(
                    version = snapshot.state.last_updated,
                    fetched_at = snapshot.fetched_at,
                    "Serving cached state"
                );
                LoadOutcome {
                    state: snapshot.state,
                    origin: StateOrigin::Cache,
                    error: Some(error),
                }
            }
            None => LoadOutcome {
                state: SharedState::initial(self.now()),
                origin: StateOrigin::Default,
                error: Some(error),
            },
        }
    }
}
