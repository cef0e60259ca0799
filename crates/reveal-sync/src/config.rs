//! Sync client configuration
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! ```toml
//! poll_interval_secs = 5
//! cache_path = "./data/reveal-cache.redb"
//!
//! [remote]
//! mode = "proxied"
//! url = "https://reveal-proxy.example.workers.dev"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reveal_storage::{InMemorySnapshotCache, RedbSnapshotCache, SnapshotCache};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::SyncClient;
use crate::error::{Result, SyncError};
use crate::rate_limit::RateLimiter;
use crate::remote::{DocumentStoreClient, DocumentStoreSettings, ProxyClient, RemoteStore};

/// Environment variable overriding the proxy URL
pub const ENV_PROXY_URL: &str = "REVEAL_PROXY_URL";
/// Environment variable overriding the document id (direct mode)
pub const ENV_DOCUMENT_ID: &str = "REVEAL_DOCUMENT_ID";
/// Environment variable overriding the write credential (direct mode)
pub const ENV_TOKEN: &str = "REVEAL_TOKEN";

/// How the client reaches the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RemoteMode {
    /// Through the credential-holding proxy
    Proxied { url: String },
    /// Straight to the document store; development only
    Direct(DocumentStoreSettings),
}

impl Default for RemoteMode {
    fn default() -> Self {
        Self::Proxied {
            url: "http://127.0.0.1:8787".to_string(),
        }
    }
}

/// Configuration for a [`SyncClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub remote: RemoteMode,
    /// Base polling interval in seconds
    pub poll_interval_secs: u64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Persistent cache file; in-memory cache when unset
    pub cache_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: RemoteMode::default(),
            poll_interval_secs: 5,
            request_timeout_secs: 10,
            cache_path: None,
        }
    }
}

impl SyncConfig {
    /// Proxied configuration for `url`
    pub fn proxied(url: impl Into<String>) -> Self {
        Self {
            remote: RemoteMode::Proxied { url: url.into() },
            ..Default::default()
        }
    }

    /// Direct configuration
    pub fn direct(settings: DocumentStoreSettings) -> Self {
        Self {
            remote: RemoteMode::Direct(settings),
            ..Default::default()
        }
    }

    /// Set the persistent cache file
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`.
    ///
    /// A proxy URL selects proxied mode. A document id switches to direct
    /// mode only when no proxy URL is given. A token only applies in direct
    /// mode.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get(ENV_PROXY_URL) {
            self.remote = RemoteMode::Proxied { url };
        } else if let Some(document_id) = get(ENV_DOCUMENT_ID) {
            match &mut self.remote {
                RemoteMode::Direct(settings) => settings.document_id = document_id,
                RemoteMode::Proxied { .. } => {
                    self.remote = RemoteMode::Direct(DocumentStoreSettings::new(document_id));
                }
            }
        }

        if let (Some(token), RemoteMode::Direct(settings)) = (get(ENV_TOKEN), &mut self.remote) {
            settings.token = Some(token);
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Build the remote adapter for this configuration
    pub fn build_remote(&self, limiter: Arc<RateLimiter>) -> Result<Arc<dyn RemoteStore>> {
        let remote: Arc<dyn RemoteStore> = match &self.remote {
            RemoteMode::Proxied { url } => Arc::new(ProxyClient::with_timeout(
                url,
                limiter,
                self.request_timeout(),
            )?),
            RemoteMode::Direct(settings) => {
                warn!(
                    document = %settings.document_id,
                    "Direct document-store access is a development fallback; \
                     the write credential lives in this process"
                );
                Arc::new(DocumentStoreClient::with_timeout(
                    settings.clone(),
                    limiter,
                    self.request_timeout(),
                )?)
            }
        };
        Ok(remote)
    }

    /// Build the snapshot cache for this configuration
    pub fn build_cache(&self) -> Result<Arc<dyn SnapshotCache>> {
        let cache: Arc<dyn SnapshotCache> = match &self.cache_path {
            Some(path) => Arc::new(
                RedbSnapshotCache::open(path.clone()).map_err(|e| SyncError::Config(e.to_string()))?,
            ),
            None => Arc::new(InMemorySnapshotCache::new()),
        };
        Ok(cache)
    }

    /// Build a ready-to-use client
    pub fn connect(&self) -> Result<SyncClient> {
        let limiter = Arc::new(RateLimiter::new());
        let remote = self.build_remote(limiter.clone())?;
        let cache = self.build_cache()?;
        Ok(SyncClient::new(remote, cache, limiter).with_poll_interval(self.poll_interval()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(matches!(config.remote, RemoteMode::Proxied { .. }));
    }

    #[test]
    fn test_parse_proxied() {
        let config = SyncConfig::from_toml_str(
            r#"
            poll_interval_secs = 3

            [remote]
            mode = "proxied"
            url = "https://proxy.example"
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(
            config.remote,
            RemoteMode::Proxied {
                url: "https://proxy.example".to_string()
            }
        );
    }

    #[test]
    fn test_parse_direct() {
        let config = SyncConfig::from_toml_str(
            r#"
            cache_path = "/tmp/cache.redb"

            [remote]
            mode = "direct"
            document_id = "abc123"
            "#,
        )
        .unwrap();

        let RemoteMode::Direct(settings) = &config.remote else {
            panic!("expected direct mode");
        };
        assert_eq!(settings.document_id, "abc123");
        assert_eq!(settings.file_name, "guestState.json");
        assert_eq!(settings.api_base, "https://api.github.com");
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/cache.redb")));
    }

    #[test]
    fn test_invalid_toml() {
        let err = SyncConfig::from_toml_str("poll_interval_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_env_proxy_url_wins() {
        let config = SyncConfig::direct(DocumentStoreSettings::new("doc")).apply_env_from(env(&[
            (ENV_PROXY_URL, "https://proxy.example"),
            (ENV_DOCUMENT_ID, "other"),
            (ENV_TOKEN, "secret"),
        ]));

        assert_eq!(
            config.remote,
            RemoteMode::Proxied {
                url: "https://proxy.example".to_string()
            }
        );
    }

    #[test]
    fn test_env_document_id_selects_direct() {
        let config = SyncConfig::default()
            .apply_env_from(env(&[(ENV_DOCUMENT_ID, "doc"), (ENV_TOKEN, "secret")]));

        let RemoteMode::Direct(settings) = &config.remote else {
            panic!("expected direct mode");
        };
        assert_eq!(settings.document_id, "doc");
        assert_eq!(settings.usable_token(), Some("secret"));
    }

    #[test]
    fn test_blank_env_ignored() {
        let config = SyncConfig::proxied("https://a.example")
            .apply_env_from(env(&[(ENV_PROXY_URL, "  ")]));
        assert_eq!(config, SyncConfig::proxied("https://a.example"));
    }

    #[test]
    fn test_connect_with_persistent_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::proxied("http://127.0.0.1:1")
            .with_cache_path(dir.path().join("cache.redb"));

        let client = config.connect().unwrap();
        assert_eq!(client.poll_interval(), Duration::from_secs(5));
        assert!(client.cached().is_err());
    }

    #[test]
    fn test_connect_rejects_empty_direct_document() {
        let config = SyncConfig::direct(DocumentStoreSettings::default());
        assert!(matches!(config.connect(), Err(SyncError::Config(_))));
    }
}
