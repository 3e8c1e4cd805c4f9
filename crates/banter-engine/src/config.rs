//! Configuration types for the banter engine.
//!
//! Configuration lives in `<data-dir>/config.json`. Every field has a
//! default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for banter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Origin of the remote chat service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path of the chat route on the endpoint.
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Timeout in seconds for a single chat request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Minimum time before a reply is shown, in milliseconds (0 disables).
    #[serde(default = "default_min_reply_delay")]
    pub min_reply_delay_ms: u64,

    /// Whether to send the prior conversation along with each message.
    #[serde(default = "default_send_history")]
    pub send_history: bool,
}

fn default_endpoint() -> String {
    "https://chatbot-backend-production-cbeb.up.railway.app".into()
}

fn default_chat_path() -> String {
    "/api/chat".into()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_min_reply_delay() -> u64 {
    1000
}

fn default_send_history() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chat_path: default_chat_path(),
            request_timeout_seconds: default_request_timeout(),
            min_reply_delay_ms: default_min_reply_delay(),
            send_history: default_send_history(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        std::fs::write(path, content).map_err(ConfigError::Io)
    }

    /// Full URL of the chat route.
    pub fn chat_url(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.chat_path.trim_start_matches('/')
        )
    }

    /// Host (and port) of the endpoint, without scheme or path.
    pub fn endpoint_host(&self) -> &str {
        let rest = self
            .endpoint
            .split_once("://")
            .map_or(self.endpoint.as_str(), |(_, rest)| rest);
        rest.split('/').next().unwrap_or(rest)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn min_reply_delay(&self) -> Duration {
        Duration::from_millis(self.min_reply_delay_ms)
    }
}

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading or writing config.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing config JSON.
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Error serializing config to JSON.
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
}
