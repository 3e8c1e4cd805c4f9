//! Application state and update logic for the banter TUI.

use crate::event::{key_to_action, Action};
use crate::screens::chat::message_area;
use crate::ui::widgets::{MessageList, TextInputState};
use banter_engine::{
    link_urls, ApiError, Conversation, ConversationStore, KeyValueStore, PendingTurn, Stage,
    Submission, TurnError, TurnTicket,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use tracing::{debug, warn};

/// Lines moved by PageUp / PageDown.
const PAGE_LINES: usize = 10;

/// Notification lifetime: ~3 seconds at the 250ms tick rate.
const NOTIFICATION_TICKS: usize = 12;

/// The current screen being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Chat,
    RestartConfirm,
    QuitConfirm,
}

/// What the chat input did with a key.
#[derive(Debug)]
pub enum InputOutcome {
    /// Not an input key; handle it as an action.
    Ignored,
    Consumed,
    /// Enter started a remote turn.
    Send(PendingTurn),
}

/// Application state.
pub struct App {
    pub should_quit: bool,

    pub show_help: bool,

    pub screen: Screen,

    pub conversation: Conversation,

    store: ConversationStore<Box<dyn KeyValueStore>>,

    pub input_state: TextInputState,

    /// Lines scrolled up from the newest message.
    pub scroll: usize,

    /// Tick counter for animations.
    pub tick: usize,

    /// Chat service host, shown in the status bar.
    pub endpoint: String,

    /// Notification message (displayed temporarily, cleared after some ticks).
    pub notification: Option<String>,

    notification_ttl: usize,

    /// Created on first copy and kept so the selection outlives the call.
    clipboard: Option<arboard::Clipboard>,
}

impl App {
    /// Create the app, restoring whatever conversation `store` holds.
    pub fn new(store: Box<dyn KeyValueStore>, send_history: bool, endpoint: String) -> Self {
        let mut store = ConversationStore::new(store);
        let conversation = store.load().with_history(send_history);

        let mut app = Self {
            should_quit: false,
            show_help: false,
            screen: Screen::Chat,
            conversation,
            store,
            input_state: TextInputState::new(),
            scroll: 0,
            tick: 0,
            endpoint,
            notification: None,
            notification_ttl: 0,
            clipboard: None,
        };
        app.persist();
        app
    }

    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self::new(
            Box::new(banter_engine::MemoryStore::new()),
            true,
            "localhost:8080".to_string(),
        )
    }

    /// Route a key press: chat input first, then screen actions.
    ///
    /// Returns the turn to dispatch when Enter sent a message that needs
    /// the remote service.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<PendingTurn> {
        if self.screen == Screen::Chat && !self.show_help {
            match self.handle_input_key(key) {
                InputOutcome::Consumed => return None,
                InputOutcome::Send(turn) => return Some(turn),
                InputOutcome::Ignored => {}
            }
        }
        self.handle_action(key_to_action(key));
        None
    }

    /// Apply a key to the chat input.
    pub fn handle_input_key(&mut self, key: KeyEvent) -> InputOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return InputOutcome::Ignored;
        }

        match key.code {
            KeyCode::Enter => match self.submit_input() {
                Some(turn) => InputOutcome::Send(turn),
                None => InputOutcome::Consumed,
            },
            KeyCode::Esc if !self.input_state.is_empty() => {
                self.input_state.clear();
                InputOutcome::Consumed
            }
            KeyCode::Char(c) => {
                self.input_state.insert(c);
                InputOutcome::Consumed
            }
            KeyCode::Backspace => {
                self.input_state.backspace();
                InputOutcome::Consumed
            }
            KeyCode::Delete => {
                self.input_state.delete();
                InputOutcome::Consumed
            }
            KeyCode::Left => {
                self.input_state.move_left();
                InputOutcome::Consumed
            }
            KeyCode::Right => {
                self.input_state.move_right();
                InputOutcome::Consumed
            }
            KeyCode::Home => {
                self.input_state.move_home();
                InputOutcome::Consumed
            }
            KeyCode::End if !self.input_state.is_empty() => {
                self.input_state.move_end();
                InputOutcome::Consumed
            }
            KeyCode::Up => {
                self.input_state.history_prev();
                InputOutcome::Consumed
            }
            KeyCode::Down => {
                self.input_state.history_next();
                InputOutcome::Consumed
            }
            _ => InputOutcome::Ignored,
        }
    }

    /// Handle an action.
    pub fn handle_action(&mut self, action: Action) {
        // Any key closes help
        if self.show_help {
            self.show_help = false;
            return;
        }

        match self.screen {
            Screen::Chat => self.handle_chat_action(action),
            Screen::RestartConfirm => match action {
                Action::Select | Action::Confirm => {
                    self.restart();
                    self.screen = Screen::Chat;
                }
                Action::Back | Action::Quit => self.screen = Screen::Chat,
                _ => {}
            },
            Screen::QuitConfirm => match action {
                Action::Select | Action::Confirm | Action::Quit => self.should_quit = true,
                Action::Back => self.screen = Screen::Chat,
                _ => {}
            },
        }
    }

    fn handle_chat_action(&mut self, action: Action) {
        match action {
            Action::Quit | Action::Back => self.screen = Screen::QuitConfirm,
            Action::Help => self.show_help = true,
            Action::Restart => self.screen = Screen::RestartConfirm,
            Action::CopyLink => self.copy_last_link(),
            Action::Up => self.scroll = self.scroll.saturating_add(1),
            Action::Down => self.scroll = self.scroll.saturating_sub(1),
            Action::PageUp => self.scroll = self.scroll.saturating_add(PAGE_LINES),
            Action::PageDown => self.scroll = self.scroll.saturating_sub(PAGE_LINES),
            Action::Bottom => self.scroll = 0,
            Action::Select | Action::Confirm | Action::None => {}
        }
    }

    /// Submit the input box.
    ///
    /// Whitespace-only input is ignored. While a reply is pending the input
    /// is kept and a notification explains why nothing happened.
    pub fn submit_input(&mut self) -> Option<PendingTurn> {
        let text = self.input_state.content().to_string();
        let submission = match self.conversation.submit(&text) {
            Ok(submission) => submission,
            Err(TurnError::EmptyInput) => return None,
            Err(e) => {
                self.set_notification(e.to_string());
                return None;
            }
        };

        self.input_state.submit();
        self.scroll = 0;
        self.persist();

        match submission {
            Submission::Answered(_) => None,
            Submission::Pending(turn) => {
                debug!(
                    history = turn.request.history_len(),
                    "Dispatching chat request"
                );
                Some(turn)
            }
        }
    }

    /// Apply the outcome of a dispatched turn.
    pub fn finish_turn(&mut self, ticket: TurnTicket, outcome: Result<String, ApiError>) {
        if self.conversation.complete(ticket, outcome).is_none() {
            debug!("Dropped reply for a restarted conversation");
            return;
        }
        self.persist();
    }

    /// Reset to the greeting and wipe stored state.
    pub fn restart(&mut self) {
        self.conversation.reset();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored conversation");
        }
        self.input_state.clear();
        self.scroll = 0;
        self.persist();
        self.set_notification("Conversation restarted");
    }

    /// URL of the most recent link in the conversation.
    pub fn last_link(&self) -> Option<String> {
        self.conversation
            .messages()
            .iter()
            .rev()
            .find_map(|m| link_urls(&m.text).pop())
    }

    fn copy_last_link(&mut self) {
        let Some(url) = self.last_link() else {
            self.set_notification("No link to copy");
            return;
        };

        match self.set_clipboard(&url) {
            Ok(()) => self.set_notification(format!("Copied {url}")),
            Err(e) => {
                warn!(error = %e, "Clipboard unavailable");
                self.set_notification(format!("Clipboard unavailable: {url}"));
            }
        }
    }

    fn set_clipboard(&mut self, text: &str) -> Result<(), arboard::Error> {
        let clipboard = match self.clipboard.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new()?,
        };
        self.clipboard.insert(clipboard).set_text(text)
    }

    /// Message list widget for the current state.
    pub fn message_list(&self) -> MessageList<'_> {
        let list = MessageList::new(self.conversation.messages()).scroll(self.scroll);
        if self.conversation.is_loading() {
            list.typing(self.tick)
        } else {
            list
        }
    }

    /// Clamp the scroll offset to what fits in a frame of `area`.
    pub fn fit_scroll(&mut self, area: Rect) {
        let max = self.message_list().max_scroll(message_area(area));
        self.scroll = self.scroll.min(max);
    }

    /// Status bar mode label.
    pub fn mode(&self) -> &'static str {
        match self.conversation.stage() {
            Stage::Greeting => "Greeting",
            Stage::Chatting => "Chatting",
        }
    }

    /// Set a temporary notification message.
    fn set_notification(&mut self, msg: impl Into<String>) {
        self.notification = Some(msg.into());
        self.notification_ttl = NOTIFICATION_TICKS;
    }

    /// Increment tick counter and update time-based state.
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);

        if self.notification_ttl > 0 {
            self.notification_ttl -= 1;
            if self.notification_ttl == 0 {
                self.notification = None;
            }
        }
    }

    /// Write changed conversation state to the store.
    fn persist(&mut self) {
        match self.store.sync(&self.conversation) {
            Ok(0) => {}
            Ok(written) => debug!(written, "Saved conversation"),
            Err(e) => {
                warn!(error = %e, "Failed to save conversation");
                self.set_notification(format!("Could not save conversation: {e}"));
            }
        }
    }
}
