//! Change notifier: periodic load with version comparison
//!
//! The document store has no push channel, so observers are driven by a
//! timer. Each tick waits the base interval (lengthened by the backoff after
//! consecutive failures), loads the document and dispatches it when its
//! version is newer than the last one dispatched or when it carries content
//! the last dispatched state lacked. Versions come from independent session
//! clocks, so a skewed writer can add a guest under a lower version.

use std::time::Duration;

use reveal_core::SharedState;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{StateOrigin, SyncClient};
use crate::rate_limit::backoff_delay;

/// Handle to a running poller
///
/// Dropping the handle cancels the poller, as does [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop polling. A load already in flight completes but its result is
    /// discarded.
    pub fn unsubscribe(mut self) {
        self.token.cancel();
        self.handle.take();
    }

    /// Whether the poller is still running
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Background polling task
pub(crate) struct Poller<F> {
    client: SyncClient,
    interval: Duration,
    on_change: F,
    token: CancellationToken,
    /// Consecutive failed polls, drives the backoff
    consecutive_errors: u32,
    /// Last state handed to `on_change`
    last_dispatched: Option<SharedState>,
}

impl<F> Poller<F>
where
    F: Fn(SharedState) + Send + Sync + 'static,
{
    /// Spawn a poller on the current runtime
    pub(crate) fn spawn(client: SyncClient, interval: Duration, on_change: F) -> Subscription {
        let token = CancellationToken::new();
        let poller = Self {
            client,
            interval,
            on_change,
            token: token.clone(),
            consecutive_errors: 0,
            last_dispatched: None,
        };

        let handle = tokio::spawn(poller.run());
        Subscription {
            token,
            handle: Some(handle),
        }
    }

    async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Poller started");

        loop {
            let delay = backoff_delay(self.consecutive_errors, self.interval);
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.tick().await {
                break;
            }
        }

        info!("Poller stopped");
    }

    /// One poll. Returns false once cancelled.
    async fn tick(&mut self) -> bool {
        if self.client.rate_limiter().should_skip(self.client.now()) {
            // Error count stays as is; the budget says nothing about health.
            return true;
        }

        let outcome = self.client.load_outcome().await;
        if self.token.is_cancelled() {
            debug!("Discarding poll result after cancellation");
            return false;
        }

        match outcome.origin {
            StateOrigin::Remote => {
                self.consecutive_errors = 0;
                if self.is_news(&outcome.state) {
                    debug!(version = outcome.state.last_updated, "Dispatching newer state");
                    self.last_dispatched = Some(outcome.state.clone());
                    (self.on_change)(outcome.state);
                }
            }
            StateOrigin::Cache | StateOrigin::Default => {
                self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                debug!(
                    consecutive_errors = self.consecutive_errors,
                    next_delay_ms =
                        backoff_delay(self.consecutive_errors, self.interval).as_millis() as u64,
                    "Poll failed"
                );
            }
        }
        true
    }

    fn is_news(&self, state: &SharedState) -> bool {
        self.last_dispatched.as_ref().is_none_or(|seen| {
            state.last_updated > seen.last_updated || !seen.subsumes(state)
        })
    }
}
