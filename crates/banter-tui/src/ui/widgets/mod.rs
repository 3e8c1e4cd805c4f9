//! Reusable widgets for the banter TUI.

pub mod message_list;
pub mod status_bar;
pub mod text_input;

pub use message_list::MessageList;
pub use status_bar::{KeyHint, StatusBar};
pub use text_input::TextInputState;
