//! Conversation state machine.
//!
//! A conversation starts in the `Greeting` stage with a single bot message
//! asking for the user's name. The first user input answers that question
//! locally and moves the conversation to `Chatting`, where every turn goes to
//! the remote chat service. Only [`Conversation::reset`] goes back.

use crate::client::{ApiError, ChatRequest};
use crate::message::{Message, MessageIds, Sender};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// First bot message of every conversation.
pub const SEED_GREETING: &str =
    "Hi there! Happy to answer questions about my work. Before we start, what should I call you?";

/// Bot reply when the user declines to give a name.
pub const GENERIC_FOLLOW_UP: &str = "No problem at all! What would you like to know?";

/// Bot reply when the remote call fails for any reason.
pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble connecting. Please try again.";

/// Inputs treated as "I'd rather not give my name". Compared lowercased and trimmed.
pub const REFUSAL_TOKENS: [&str; 8] = [
    "no",
    "nah",
    "skip",
    "n/a",
    "anon",
    "anonymous",
    "i prefer not to say",
    "i'd rather not",
];

/// Check whether an answer to the name question is a refusal.
pub fn is_refusal(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    REFUSAL_TOKENS.contains(&normalized.as_str())
}

/// Greeting addressed to a user by name.
pub fn personal_greeting(name: &str) -> String {
    format!("Nice to meet you, {name}! What would you like to know?")
}

/// Coarse conversation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Waiting for the user's name.
    #[default]
    Greeting,
    /// Regular chat with the remote service.
    Chatting,
}

impl Stage {
    /// Storage token for this stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Chatting => "chatting",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "greeting" => Ok(Self::Greeting),
            "chatting" => Ok(Self::Chatting),
            other => Err(ParseStageError(other.to_string())),
        }
    }
}

/// Unknown stage token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown conversation stage: {0:?}")]
pub struct ParseStageError(pub String);

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    /// Nothing left after trimming.
    #[error("Message is empty")]
    EmptyInput,

    /// A previous turn is still waiting for its reply.
    #[error("A reply is still pending")]
    Busy,
}

/// Identifies an outstanding remote turn.
///
/// Tickets from before a reset are stale; their replies are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket(u64);

/// A turn waiting on the remote service.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub ticket: TurnTicket,
    pub request: ChatRequest,
}

/// Result of submitting user input.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Handled locally; carries the bot reply already appended to the log.
    Answered(Message),
    /// The caller must send the request and pass the outcome to
    /// [`Conversation::complete`].
    Pending(PendingTurn),
}

/// A single conversation: stage, message log and in-flight flag.
#[derive(Debug, Clone)]
pub struct Conversation {
    stage: Stage,
    messages: Vec<Message>,
    loading: bool,
    send_history: bool,
    generation: u64,
    ids: MessageIds,
}

impl Conversation {
    /// Create a fresh conversation seeded with the greeting.
    pub fn new() -> Self {
        let mut ids = MessageIds::default();
        let seed = Message::new(ids.next_id(), SEED_GREETING, Sender::Bot);
        Self {
            stage: Stage::Greeting,
            messages: vec![seed],
            loading: false,
            send_history: true,
            generation: 0,
            ids,
        }
    }

    /// Rebuild a conversation from stored fields.
    ///
    /// An empty log is replaced by a fresh seeded conversation.
    pub fn from_parts(stage: Stage, messages: Vec<Message>) -> Self {
        if messages.is_empty() {
            return Self::new();
        }
        let ids = MessageIds::after(&messages);
        Self {
            stage,
            messages,
            loading: false,
            send_history: true,
            generation: 0,
            ids,
        }
    }

    /// Choose whether remote requests carry the prior log.
    #[must_use]
    pub fn with_history(mut self, enabled: bool) -> Self {
        self.send_history = enabled;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a remote reply is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Go back to the greeting stage with only the seed message.
    ///
    /// Any outstanding turn is abandoned.
    pub fn reset(&mut self) {
        let seed = Message::new(self.ids.next_id(), SEED_GREETING, Sender::Bot);
        self.stage = Stage::Greeting;
        self.messages = vec![seed];
        self.loading = false;
        self.generation += 1;
    }

    /// Submit user input.
    ///
    /// The trimmed text is appended as a user message right away. In the
    /// greeting stage the bot answers locally; in the chatting stage the
    /// conversation enters the loading state and hands back the request to
    /// send.
    pub fn submit(&mut self, input: &str) -> Result<Submission, TurnError> {
        if self.loading {
            return Err(TurnError::Busy);
        }
        let text = input.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyInput);
        }

        match self.stage {
            Stage::Greeting => {
                self.push(text, Sender::User);
                let reply = if is_refusal(text) {
                    GENERIC_FOLLOW_UP.to_string()
                } else {
                    personal_greeting(text)
                };
                let reply = self.push(reply, Sender::Bot).clone();
                self.stage = Stage::Chatting;
                Ok(Submission::Answered(reply))
            }
            Stage::Chatting => {
                let request = if self.send_history {
                    ChatRequest::with_history(&self.messages, text)
                } else {
                    ChatRequest::message_only(text)
                };
                self.push(text, Sender::User);
                self.loading = true;
                Ok(Submission::Pending(PendingTurn {
                    ticket: TurnTicket(self.generation),
                    request,
                }))
            }
        }
    }

    /// Apply the outcome of a remote turn.
    ///
    /// A reply is appended as a bot message; any error appends
    /// [`FALLBACK_REPLY`]. Loading is cleared either way. Returns `None` when
    /// the ticket predates a reset and the outcome was dropped.
    pub fn complete(
        &mut self,
        ticket: TurnTicket,
        outcome: Result<String, ApiError>,
    ) -> Option<&Message> {
        if ticket.0 != self.generation {
            return None;
        }
        self.loading = false;
        let text = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Chat request failed, showing fallback reply");
                FALLBACK_REPLY.to_string()
            }
        };
        Some(self.push(text, Sender::Bot))
    }

    fn push(&mut self, text: impl Into<String>, sender: Sender) -> &Message {
        let message = Message::new(self.ids.next_id(), text, sender);
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chatting() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.submit("Alice").unwrap();
        conversation
    }

    fn expect_pending(submission: Submission) -> PendingTurn {
        match submission {
            Submission::Pending(turn) => turn,
            Submission::Answered(_) => panic!("expected a remote turn"),
        }
    }

    #[test]
    fn test_new_conversation_is_seeded() {
        let conversation = Conversation::new();
        assert_eq!(conversation.stage(), Stage::Greeting);
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].text, SEED_GREETING);
        assert!(conversation.messages()[0].is_bot());
        assert!(!conversation.is_loading());
    }

    #[test]
    fn test_refusal_tokens_any_case_and_padding() {
        for token in REFUSAL_TOKENS {
            let padded = format!("  {}  ", token.to_uppercase());
            assert!(is_refusal(&padded), "{padded:?} should be a refusal");

            let mut conversation = Conversation::new();
            let submission = conversation.submit(&padded).unwrap();
            assert!(matches!(submission, Submission::Answered(_)));
            assert_eq!(conversation.stage(), Stage::Chatting);
            assert_eq!(
                conversation.last_message().unwrap().text,
                GENERIC_FOLLOW_UP
            );
        }
    }

    #[test]
    fn test_name_is_echoed() {
        for name in ["Alice", "Dr. Bob Smith", "nope", "No thanks"] {
            let mut conversation = Conversation::new();
            conversation.submit(name).unwrap();
            assert_eq!(conversation.stage(), Stage::Chatting);
            let reply = conversation.last_message().unwrap();
            assert!(reply.is_bot());
            assert!(reply.text.contains(name), "{:?} should mention {name}", reply.text);
            assert_ne!(reply.text, GENERIC_FOLLOW_UP);
        }
    }

    #[test]
    fn test_greeting_turn_appends_user_then_bot() {
        let conversation = chatting();
        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[1].is_user());
        assert_eq!(messages[1].text, "Alice");
        assert!(messages[2].is_bot());
        assert!(!conversation.is_loading());
    }

    #[test]
    fn test_greeting_echoes_trimmed_name() {
        let mut conversation = Conversation::new();
        conversation.submit("  Alice \n").unwrap();

        let messages = conversation.messages();
        assert_eq!(messages[1].text, "Alice");
        assert_eq!(messages[2].text, personal_greeting("Alice"));
        assert!(messages[2].text.contains(", Alice!"));
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut conversation = Conversation::new();
        assert_eq!(conversation.submit("").unwrap_err(), TurnError::EmptyInput);
        assert_eq!(conversation.submit("   \n\t").unwrap_err(), TurnError::EmptyInput);
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.stage(), Stage::Greeting);
    }

    #[test]
    fn test_chatting_turn_sets_loading_and_builds_request() {
        let mut conversation = chatting();
        let turn = expect_pending(conversation.submit("What projects have you built?").unwrap());

        assert!(conversation.is_loading());
        assert_eq!(turn.request.message, "What projects have you built?");
        assert_eq!(turn.request.history_len(), 2);
        assert!(conversation.last_message().unwrap().is_user());
    }

    #[test]
    fn test_history_can_be_disabled() {
        let mut conversation = chatting().with_history(false);
        let turn = expect_pending(conversation.submit("hello").unwrap());
        assert!(turn.request.history.is_none());
    }

    #[test]
    fn test_busy_while_loading() {
        let mut conversation = chatting();
        let _turn = expect_pending(conversation.submit("first").unwrap());
        let before = conversation.messages().len();

        assert_eq!(conversation.submit("second").unwrap_err(), TurnError::Busy);
        assert_eq!(conversation.messages().len(), before);
        assert!(conversation.is_loading());
    }

    #[test]
    fn test_complete_success_appends_reply() {
        let mut conversation = chatting();
        let turn = expect_pending(conversation.submit("hi").unwrap());

        let reply = conversation
            .complete(turn.ticket, Ok("Hello!".into()))
            .unwrap();
        assert_eq!(reply.text, "Hello!");
        assert!(reply.is_bot());
        assert!(!conversation.is_loading());
    }

    #[test]
    fn test_complete_failure_appends_one_fallback() {
        let mut conversation = chatting();
        let turn = expect_pending(conversation.submit("hi").unwrap());
        let before = conversation.messages().len();

        conversation.complete(turn.ticket, Err(ApiError::Status(503)));
        assert_eq!(conversation.messages().len(), before + 1);
        assert_eq!(conversation.last_message().unwrap().text, FALLBACK_REPLY);
        assert!(!conversation.is_loading());
    }

    #[test]
    fn test_reset_restores_seed() {
        let mut conversation = chatting();
        for i in 0..5 {
            let turn = expect_pending(conversation.submit(&format!("message {i}")).unwrap());
            conversation.complete(turn.ticket, Ok(format!("reply {i}")));
        }
        assert!(conversation.messages().len() > 10);

        conversation.reset();
        assert_eq!(conversation.stage(), Stage::Greeting);
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].text, SEED_GREETING);
    }

    #[test]
    fn test_reset_drops_stale_reply() {
        let mut conversation = chatting();
        let turn = expect_pending(conversation.submit("hi").unwrap());

        conversation.reset();
        assert!(!conversation.is_loading());
        assert!(conversation.complete(turn.ticket, Ok("late".into())).is_none());
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn test_from_parts_with_empty_log_is_seeded() {
        let conversation = Conversation::from_parts(Stage::Chatting, Vec::new());
        assert_eq!(conversation.stage(), Stage::Greeting);
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn test_ids_increase_across_turns() {
        let mut conversation = chatting();
        let turn = expect_pending(conversation.submit("hi").unwrap());
        conversation.complete(turn.ticket, Ok("hey".into()));

        let ids: Vec<i64> = conversation.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_stage_tokens() {
        assert_eq!("greeting".parse::<Stage>().unwrap(), Stage::Greeting);
        assert_eq!("chatting".parse::<Stage>().unwrap(), Stage::Chatting);
        assert!("Chatting".parse::<Stage>().is_err());
        assert_eq!(Stage::Chatting.to_string(), "chatting");
    }
}
