//! banter-engine: Headless conversation engine for the banter chat client
//!
//! This crate provides everything except the terminal UI:
//! - The greeting/chatting conversation state machine
//! - The remote chat API client and turn handling
//! - Durable key-value persistence of the conversation
//! - Link detection in message text
//! - Configuration

pub mod client;
pub mod config;
pub mod conversation;
pub mod links;
pub mod message;
pub mod persistence;
pub mod turn;

// Re-export commonly used types
pub use client::{ApiError, ChatBackend, ChatRequest, HistoryEntry, HistoryRole, HttpChatBackend};
pub use config::{Config, ConfigError};
pub use conversation::{
    is_refusal, Conversation, PendingTurn, Stage, Submission, TurnError, TurnTicket,
    FALLBACK_REPLY, GENERIC_FOLLOW_UP, SEED_GREETING,
};
pub use links::{link_urls, segments, Segment, BARE_LINK_LABEL};
pub use message::{Message, Sender};
pub use persistence::{
    ConversationStore, FileStore, KeyValueStore, MemoryStore, PersistenceError, HISTORY_KEY,
    STAGE_KEY,
};
pub use turn::{exchange, run_turn, TurnOutcome};

/// Returns the engine version.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
