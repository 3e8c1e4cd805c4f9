//! Chat screen: message bubbles, input box and status bar.

use crate::app::App;
use crate::screens::{render_confirm_overlay, Screen};
use crate::ui::theme::Styles;
use crate::ui::widgets::{KeyHint, StatusBar};
use crate::ui::{chat_layout, main_layout};
use banter_engine::Stage;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    widgets::{Block, Borders, Widget},
};

/// The chat screen.
pub struct ChatScreen;

/// Area inside the message list border for a full-frame `area`.
pub fn message_area(area: Rect) -> Rect {
    let (main_area, _) = main_layout(area);
    let (list_area, _) = chat_layout(main_area);
    Block::default().borders(Borders::ALL).inner(list_area)
}

impl Screen for ChatScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (main_area, status_area) = main_layout(area);
        let (list_area, input_area) = chat_layout(main_area);

        let list_block = Block::default()
            .title(" banter ")
            .title_style(Styles::title())
            .borders(Borders::ALL)
            .border_style(Styles::border())
            .style(Styles::default());
        let inner = list_block.inner(list_area);
        list_block.render(list_area, buf);
        app.message_list().render(inner, buf);

        let placeholder = match app.conversation.stage() {
            Stage::Greeting => "Type your name...",
            Stage::Chatting => "Ask me anything...",
        };
        let input_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::border_active())
            .style(Styles::default());
        app.input_state
            .widget()
            .block(input_block)
            .placeholder(placeholder)
            .render(input_area, buf);

        let mut hints = vec![
            KeyHint::new("Enter", "Send"),
            KeyHint::new("Ctrl+R", "Restart"),
        ];
        if app.last_link().is_some() {
            hints.push(KeyHint::new("Ctrl+Y", "Copy link"));
        }
        hints.push(KeyHint::new("F1", "Help"));

        let status_bar = StatusBar::new(app.mode()).hints(hints);
        let status_bar = if let Some(notification) = &app.notification {
            status_bar.warn(notification)
        } else if app.conversation.is_loading() {
            status_bar.right("waiting for reply")
        } else {
            status_bar.right(&app.endpoint)
        };
        status_bar.render(status_area, buf);
    }
}

/// Chat screen with the restart dialog on top.
pub struct RestartConfirmScreen;

impl Screen for RestartConfirmScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ChatScreen.render(app, area, buf);
        render_confirm_overlay(
            "Restart",
            "Clear this conversation and start over?",
            area,
            buf,
        );
    }
}

/// Chat screen with the quit dialog on top.
pub struct QuitConfirmScreen;

impl Screen for QuitConfirmScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        ChatScreen.render(app, area, buf);
        render_confirm_overlay("Quit", "Leave banter?", area, buf);
    }
}
