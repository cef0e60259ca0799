//! Direct document-store client
//!
//! Reads and writes one file of a gist-style document:
//! `GET {api_base}/gists/{id}` returns `{files: {<name>: {content}}}` and
//! `PATCH` with the same shape replaces the file content.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reveal_core::SharedState;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{DEFAULT_REQUEST_TIMEOUT, RemoteStore, check_response, http_client};
use crate::error::{Result, SyncError};
use crate::rate_limit::RateLimiter;

const ACCEPT: &str = "application/vnd.github.v3+json";

/// Connection settings for the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStoreSettings {
    /// API root, e.g. `https://api.github.com`
    pub api_base: String,
    /// Document identifier
    pub document_id: String,
    /// File inside the document that holds the serialized state
    pub file_name: String,
    /// Write credential; reads are attempted without it
    pub token: Option<String>,
    /// User-Agent sent with every request
    pub user_agent: String,
    /// Description written alongside each update
    pub description: String,
}

impl Default for DocumentStoreSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            document_id: String::new(),
            file_name: "guestState.json".to_string(),
            token: None,
            user_agent: concat!("reveal-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            description: "Updated by reveal-sync".to_string(),
        }
    }
}

impl DocumentStoreSettings {
    /// Settings for a document id, everything else default
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            ..Default::default()
        }
    }

    /// Set the API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the write credential
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the file name inside the document
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// The credential, if one is set and non-blank
    pub fn usable_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct GistUpdate<'a> {
    description: &'a str,
    files: HashMap<&'a str, GistFileUpdate>,
}

#[derive(Debug, Serialize)]
struct GistFileUpdate {
    content: String,
}

/// [`RemoteStore`] backed by the document-store REST API
#[derive(Debug)]
pub struct DocumentStoreClient {
    settings: DocumentStoreSettings,
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl DocumentStoreClient {
    /// Create a client with the default request timeout
    pub fn new(settings: DocumentStoreSettings, limiter: Arc<RateLimiter>) -> Result<Self> {
        Self::with_timeout(settings, limiter, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(
        settings: DocumentStoreSettings,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Result<Self> {
        if settings.document_id.trim().is_empty() {
            return Err(SyncError::Config("document id is required".to_string()));
        }
        let http = http_client(timeout, &settings.user_agent)?;
        Ok(Self {
            settings,
            http,
            limiter,
        })
    }

    /// The settings this client was built with
    pub fn settings(&self) -> &DocumentStoreSettings {
        &self.settings
    }

    fn document_url(&self) -> String {
        format!(
            "{}/gists/{}",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.document_id
        )
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.header(reqwest::header::ACCEPT, ACCEPT);
        match self.settings.usable_token() {
            Some(token) => req.header(reqwest::header::AUTHORIZATION, format!("token {token}")),
            None => req,
        }
    }
}

#[async_trait]
impl RemoteStore for DocumentStoreClient {
    #[instrument(skip(self), fields(document = %self.settings.document_id))]
    async fn fetch_document(&self) -> Result<SharedState> {
        let response = self
            .authorized(self.http.get(self.document_url()))
            .send()
            .await?;
        let response = check_response(response, &self.limiter).await?;

        let document: GistResponse = response.json().await?;
        let content = document
            .files
            .get(&self.settings.file_name)
            .and_then(|file| file.content.as_deref())
            .ok_or_else(|| {
                SyncError::unavailable(format!(
                    "document has no file named {}",
                    self.settings.file_name
                ))
            })?;

        let state = SharedState::from_json(content)?;
        debug!(version = state.last_updated, "Fetched document");
        Ok(state)
    }

    #[instrument(skip(self, state), fields(document = %self.settings.document_id, version = state.last_updated))]
    async fn put_document(&self, state: &SharedState) -> Result<()> {
        if self.settings.usable_token().is_none() {
            return Err(SyncError::CredentialMissing);
        }

        let body = GistUpdate {
            description: &self.settings.description,
            files: HashMap::from([(
                self.settings.file_name.as_str(),
                GistFileUpdate {
                    content: state.to_json()?,
                },
            )]),
        };

        let response = self
            .authorized(self.http.patch(self.document_url()))
            .json(&body)
            .send()
            .await?;
        check_response(response, &self.limiter).await?;

        debug!("Stored document");
        Ok(())
    }
}
