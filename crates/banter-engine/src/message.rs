//! Message types for a banter conversation.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person typing into the client.
    User,
    /// The remote chat service (or a locally generated bot line).
    Bot,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Bot => write!(f, "bot"),
        }
    }
}

/// A single entry in the conversation log.
///
/// Messages are immutable once created. The log only ever grows, except
/// when the whole conversation is reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic identifier derived from the creation timestamp.
    pub id: i64,
    /// Message body.
    pub text: String,
    /// Author of the message.
    pub sender: Sender,
}

impl Message {
    /// Create a message with an explicit id.
    pub fn new(id: i64, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }
}

/// Hands out message ids.
///
/// Ids are millisecond timestamps, bumped past the previous id when two
/// messages land in the same millisecond (or the clock steps backwards).
#[derive(Debug, Clone, Default)]
pub struct MessageIds {
    last: i64,
}

impl MessageIds {
    /// Create a generator that continues after the highest id in `messages`.
    pub fn after(messages: &[Message]) -> Self {
        let last = messages.iter().map(|m| m.id).max().unwrap_or(0);
        Self { last }
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        self.last
    }
}
