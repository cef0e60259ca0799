//! # Reveal Sync
//!
//! Keeps many independent sessions in agreement on one small shared document
//! stored in a remote single-document store that has no transactions, coarse
//! rate limits and no push notifications.
//!
//! ## Components
//!
//! - [`RateLimiter`]: last reported call budget, consulted before each call
//! - [`RemoteStore`]: whole-document read/write, either through the proxy
//!   ([`ProxyClient`]) or straight to the store ([`DocumentStoreClient`])
//! - [`SyncClient`]: `load`, `mutate` and `subscribe` on top of the remote,
//!   the local snapshot cache and the rate limiter
//! - [`Subscription`]: handle to the background poller
//!
//! ## Example
//!
//! ```rust,ignore
//! use reveal_core::admit_guest;
//! use reveal_sync::SyncConfig;
//!
//! let client = SyncConfig::proxied("https://proxy.example").apply_env().connect()?;
//!
//! let state = client.load().await;
//! client.mutate(admit_guest("guest-7")).await?;
//!
//! let subscription = client.subscribe(|state| {
//!     println!("{} guests checked in", state.revealed_count());
//! });
//! ```
//!
//! Every transform passed to [`SyncClient::mutate`] must be a merge of the
//! loaded state (set-union, logical OR). Writes are a non-atomic
//! read-modify-write and a replacing transform loses concurrent edits.

pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod rate_limit;
pub mod remote;

pub use client::{DEFAULT_POLL_INTERVAL, LoadOutcome, StateOrigin, SyncClient};
pub use config::{RemoteMode, SyncConfig};
pub use error::{Result, SyncError};
pub use poller::Subscription;
pub use rate_limit::{RateLimitHeaders, RateLimitStatus, RateLimiter, backoff_delay};
pub use remote::{
    DocumentStoreClient, DocumentStoreSettings, InMemoryRemoteStore, InjectedFailure, ProxyClient,
    RemoteStore,
};
