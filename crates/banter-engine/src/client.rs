//! Remote chat API client.
//!
//! One request per user turn: `POST {endpoint}/api/chat` with the new message
//! (and optionally the prior log), answered with `{ "reply": "..." }`.

use crate::config::Config;
use crate::message::{Message, Sender};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Role names understood by the remote contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Model,
}

impl From<Sender> for HistoryRole {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Self::User,
            Sender::Bot => Self::Model,
        }
    }
}

/// A text fragment within a history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One prior message, re-shaped for the remote contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub parts: Vec<Part>,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.sender.into(),
            parts: vec![Part {
                text: message.text.clone(),
            }],
        }
    }
}

/// Request body for a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    pub message: String,
}

impl ChatRequest {
    /// Request carrying only the new message.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            history: None,
            message: message.into(),
        }
    }

    /// Request carrying the new message and the log that preceded it.
    ///
    /// Bot messages before the first user message (the seed greeting) are
    /// left out, so the history always opens with a user entry.
    pub fn with_history(prior: &[Message], message: impl Into<String>) -> Self {
        let history = prior
            .iter()
            .skip_while(|m| m.is_bot())
            .map(HistoryEntry::from)
            .collect();
        Self {
            history: Some(history),
            message: message.into(),
        }
    }

    /// Number of history entries sent along with the message.
    pub fn history_len(&self) -> usize {
        self.history.as_ref().map_or(0, Vec::len)
    }
}

/// Response body for a chat turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Errors from the remote chat call.
///
/// The conversation treats every variant the same way; the split exists
/// for logging.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection, TLS or timeout failure.
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("Server returned status {0}")]
    Status(u16),

    /// Response body was not `{ "reply": string }`.
    #[error("Invalid response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// The task carrying the request never produced a result.
    #[error("Request interrupted: {0}")]
    Interrupted(String),
}

/// Anything that can answer a chat request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one request and return the reply text.
    async fn send(&self, request: &ChatRequest) -> Result<String, ApiError>;
}

/// `ChatBackend` talking to the remote service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpChatBackend {
    /// Create a backend posting to `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Create a backend from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.chat_url(), config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, request: &ChatRequest) -> Result<String, ApiError> {
        debug!(url = %self.url, history = request.history_len(), "Posting chat request");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let body: ChatReply = response.json().await.map_err(ApiError::Decode)?;
        Ok(body.reply)
    }
}
