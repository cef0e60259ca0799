//! Proxy configuration
//!
//! Values come from CLI flags, their environment fallbacks and an optional
//! TOML file. Flags and environment win over the file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use reveal_sync::DocumentStoreSettings;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

/// Command line of the `reveal-proxy` binary
#[derive(Parser, Debug, Clone)]
#[command(name = "reveal-proxy")]
#[command(about = "Holds the document-store credential on behalf of browser sessions")]
pub struct ProxyArgs {
    /// Address to listen on
    #[arg(long, env = "REVEAL_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Document-store write credential
    #[arg(long, env = "REVEAL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Identifier of the shared document
    #[arg(long, env = "REVEAL_DOCUMENT_ID")]
    pub document_id: Option<String>,

    /// Origins allowed to call the proxy from a browser (comma separated)
    #[arg(long = "allowed-origin", env = "REVEAL_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Document-store API root
    #[arg(long, env = "REVEAL_API_BASE")]
    pub api_base: Option<String>,

    /// TOML configuration file
    #[arg(long, env = "REVEAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default log level (RUST_LOG takes precedence)
    #[arg(long, env = "REVEAL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Human-readable logs instead of JSON lines
    #[arg(long)]
    pub pretty_logs: bool,
}

/// Contents of the optional TOML file. Absent keys mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyFileConfig {
    pub listen: Option<SocketAddr>,
    pub token: Option<String>,
    pub document_id: Option<String>,
    pub api_base: Option<String>,
    pub file_name: Option<String>,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: Option<u64>,
}

impl ProxyFileConfig {
    /// Read a TOML file
    pub fn load(path: &Path) -> Result<Self, ProxyError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
            .map_err(|e| ProxyError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ProxyError> {
        toml::from_str(content).map_err(|e| ProxyError::Config(e.to_string()))
    }
}

/// Resolved proxy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    pub token: Option<String>,
    pub document_id: Option<String>,
    pub api_base: String,
    pub file_name: String,
    pub allowed_origins: Vec<String>,
    pub request_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let store = DocumentStoreSettings::default();
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            token: None,
            document_id: None,
            api_base: store.api_base,
            file_name: store.file_name,
            allowed_origins: Vec::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ProxyConfig {
    /// Merge CLI/env arguments over the config file they point to
    pub fn resolve(args: &ProxyArgs) -> Result<Self, ProxyError> {
        let file = match &args.config {
            Some(path) => ProxyFileConfig::load(path)?,
            None => ProxyFileConfig::default(),
        };
        Ok(Self::merge(args, file))
    }

    /// Merge arguments over file values, falling back to defaults
    pub fn merge(args: &ProxyArgs, file: ProxyFileConfig) -> Self {
        let defaults = Self::default();
        let allowed_origins = if args.allowed_origins.is_empty() {
            file.allowed_origins
        } else {
            args.allowed_origins.clone()
        };

        Self {
            listen_addr: args.listen.or(file.listen).unwrap_or(defaults.listen_addr),
            token: non_blank(args.token.clone().or(file.token)),
            document_id: non_blank(args.document_id.clone().or(file.document_id)),
            api_base: args
                .api_base
                .clone()
                .or(file.api_base)
                .unwrap_or(defaults.api_base),
            file_name: file.file_name.unwrap_or(defaults.file_name),
            allowed_origins: allowed_origins
                .into_iter()
                .map(|origin| origin.trim().trim_end_matches('/').to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    /// Names of required settings that are missing
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.token.is_none() {
            missing.push("REVEAL_TOKEN");
        }
        if self.document_id.is_none() {
            missing.push("REVEAL_DOCUMENT_ID");
        }
        missing
    }

    /// Upstream settings, or `None` while required settings are missing
    pub fn document_store(&self) -> Option<DocumentStoreSettings> {
        let (Some(token), Some(document_id)) = (&self.token, &self.document_id) else {
            return None;
        };
        Some(DocumentStoreSettings {
            api_base: self.api_base.clone(),
            document_id: document_id.clone(),
            file_name: self.file_name.clone(),
            token: Some(token.clone()),
            user_agent: concat!("reveal-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            ..DocumentStoreSettings::default()
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> ProxyArgs {
        let mut argv = vec!["reveal-proxy"];
        argv.extend_from_slice(list);
        ProxyArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:8787");
        assert_eq!(config.file_name, "guestState.json");
        assert_eq!(config.missing_settings(), vec!["REVEAL_TOKEN", "REVEAL_DOCUMENT_ID"]);
        assert!(config.document_store().is_none());
    }

    #[test]
    fn test_args_win_over_file() {
        let file = ProxyFileConfig::from_toml_str(
            r#"
            listen = "0.0.0.0:9000"
            document_id = "from-file"
            token = "file-token"
            allowed_origins = ["https://file.example"]
            request_timeout_secs = 3
            "#,
        )
        .unwrap();

        let config = ProxyConfig::merge(
            &args(&[
                "--document-id",
                "from-args",
                "--allowed-origin",
                "https://a.example/,https://b.example",
            ]),
            file,
        );

        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.document_id.as_deref(), Some("from-args"));
        assert_eq!(config.token.as_deref(), Some("file-token"));
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let config = ProxyConfig::merge(
            &args(&["--token", "   ", "--document-id", "doc"]),
            ProxyFileConfig::default(),
        );
        assert_eq!(config.missing_settings(), vec!["REVEAL_TOKEN"]);
    }

    #[test]
    fn test_document_store_settings() {
        let config = ProxyConfig::merge(
            &args(&["--token", "secret", "--document-id", "doc"]),
            ProxyFileConfig::default(),
        );
        let store = config.document_store().unwrap();
        assert_eq!(store.document_id, "doc");
        assert_eq!(store.usable_token(), Some("secret"));
        assert!(store.user_agent.starts_with("reveal-proxy/"));
    }

    #[test]
    fn test_resolve_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.toml");
        std::fs::write(&path, "document_id = \"doc\"\ntoken = \"t\"\n").unwrap();

        let config =
            ProxyConfig::resolve(&args(&["--config", path.to_str().unwrap()])).unwrap();
        assert!(config.missing_settings().is_empty());
    }

    #[test]
    fn test_resolve_missing_file_fails() {
        let result = ProxyConfig::resolve(&args(&["--config", "/nonexistent/proxy.toml"]));
        assert!(matches!(result, Err(ProxyError::Config(_))));
    }
}
