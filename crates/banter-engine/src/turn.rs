//! Turn handling: one user submission and its bot reply.

use crate::client::{ApiError, ChatBackend, ChatRequest};
use crate::conversation::{Conversation, PendingTurn, Submission, TurnError, TurnTicket};
use crate::message::Message;
use std::time::{Duration, Instant};
use tracing::debug;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Answered locally during the greeting stage.
    Greeted(Message),
    /// The remote service replied.
    Replied(Message),
    /// The remote call failed; the fallback reply was appended.
    Failed(Message),
}

impl TurnOutcome {
    /// The bot message produced by the turn.
    pub fn message(&self) -> &Message {
        match self {
            Self::Greeted(m) | Self::Replied(m) | Self::Failed(m) => m,
        }
    }
}

/// Send a request, holding the result back until `min_delay` has passed.
pub async fn exchange<B>(
    backend: &B,
    request: &ChatRequest,
    min_delay: Duration,
) -> Result<String, ApiError>
where
    B: ChatBackend + ?Sized,
{
    let start = Instant::now();
    let (result, ()) = tokio::join!(backend.send(request), tokio::time::sleep(min_delay));

    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(duration_ms, ok = result.is_ok(), "Chat exchange finished");

    result
}

/// Completes the turn with a fallback if the turn future is dropped early.
struct InFlight<'a> {
    conversation: &'a mut Conversation,
    ticket: TurnTicket,
    done: bool,
}

impl InFlight<'_> {
    fn finish(mut self, outcome: Result<String, ApiError>) -> Message {
        self.done = true;
        // No reset can happen while the conversation is borrowed here
        self.conversation
            .complete(self.ticket, outcome)
            .cloned()
            .expect("ticket is current for the whole turn")
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.conversation.complete(
                self.ticket,
                Err(ApiError::Interrupted("turn cancelled".to_string())),
            );
        }
    }
}

/// Run a complete turn against `backend`.
///
/// Loading is cleared on every exit path, including cancellation of the
/// returned future.
pub async fn run_turn<B>(
    conversation: &mut Conversation,
    backend: &B,
    input: &str,
    min_delay: Duration,
) -> Result<TurnOutcome, TurnError>
where
    B: ChatBackend + ?Sized,
{
    match conversation.submit(input)? {
        Submission::Answered(reply) => Ok(TurnOutcome::Greeted(reply)),
        Submission::Pending(PendingTurn { ticket, request }) => {
            let in_flight = InFlight {
                conversation,
                ticket,
                done: false,
            };
            let result = exchange(backend, &request, min_delay).await;
            let failed = result.is_err();
            let reply = in_flight.finish(result);
            if failed {
                Ok(TurnOutcome::Failed(reply))
            } else {
                Ok(TurnOutcome::Replied(reply))
            }
        }
    }
}
