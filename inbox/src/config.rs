use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{InboxError, Result};

/// Inbox client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxConfig {
    /// Base URL of the server, e.g. "http://localhost:5000"
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// API key sent as `Authorization: Bearer <key>`. Default: no auth.
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP timeout in seconds. Default: 30.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Recency window of the inbox views. Default: 50.
    #[serde(default = "default_last")]
    pub last: u32,
}

fn default_server_url() -> String {
    "http://localhost:5000".into()
}

fn default_timeout() -> u64 {
    30
}

fn default_last() -> u32 {
    50
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_key: None,
            timeout_secs: default_timeout(),
            last: default_last(),
        }
    }
}

/// Get default config paths
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // XDG config path
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("inbox").join("config.toml"));
    }

    // Home directory fallback
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".config").join("inbox").join("config.toml"));
        paths.push(home_dir.join(".inboxrc"));
    }

    paths
}

/// Load configuration from the first default path that exists
pub fn load_config() -> Result<InboxConfig> {
    for path in default_config_paths() {
        if path.exists() {
            info!("Found config at: {:?}", path);
            return load_config_from_path(&path);
        }
    }

    info!("No config file found, using defaults");
    Ok(InboxConfig::default())
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<InboxConfig> {
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .map_err(|e| InboxError::Config(format!("Failed to read config: {}", e)))?;

    parse_config(&content)
}

/// Parse a TOML configuration document
pub fn parse_config(content: &str) -> Result<InboxConfig> {
    toml::from_str(content).map_err(|e| InboxError::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        assert_eq!(parse_config("").unwrap(), InboxConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            server_url = "https://studio.example.com"
            api_key = "secret"
            timeout_secs = 5
            last = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.server_url, "https://studio.example.com");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.last, 100);
    }

    #[test]
    fn test_parse_invalid_config() {
        let err = parse_config("timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, InboxError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config_from_path(Path::new("/nonexistent/inbox/config.toml")).unwrap_err();
        assert!(matches!(err, InboxError::Config(_)));
    }
}
