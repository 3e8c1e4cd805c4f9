//! Screen definitions for the banter TUI.

pub mod chat;

use crate::app::App;
use crate::ui::centered_fixed;
use crate::ui::theme::Styles;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

/// Trait for screens that can be rendered.
pub trait Screen {
    /// Render the screen to the buffer.
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

/// Render the help overlay.
pub fn render_help_overlay(area: Rect, buf: &mut Buffer) {
    let help_text = r"
  Chat
    Enter             Send message
    Up/Down           Previous/next sent message
    PgUp/PgDn         Scroll conversation
    End               Jump to newest (empty input)
    Esc               Clear input
    Ctrl+Y            Copy last link
    Ctrl+R            Restart conversation
    Ctrl+C            Quit
    F1                Toggle this help

  [Press any key to close]
";

    let width = 50.min(area.width.saturating_sub(4));
    let height = 16.min(area.height.saturating_sub(4));
    let overlay_area = centered_fixed(width, height, area);

    Clear.render(overlay_area, buf);

    let block = Block::default()
        .title(" Help ")
        .title_style(Styles::title())
        .borders(Borders::ALL)
        .border_style(Styles::border_active())
        .style(Styles::default());

    Paragraph::new(help_text)
        .block(block)
        .style(Styles::default())
        .render(overlay_area, buf);
}

/// Render a yes/no dialog over whatever is already drawn.
pub fn render_confirm_overlay(title: &str, question: &str, area: Rect, buf: &mut Buffer) {
    let width = 50.min(area.width.saturating_sub(4));
    let height = 7.min(area.height.saturating_sub(2));
    let overlay_area = centered_fixed(width, height, area);

    Clear.render(overlay_area, buf);

    let block = Block::default()
        .title(format!(" {title} "))
        .title_style(Styles::title())
        .borders(Borders::ALL)
        .border_style(Styles::border_active())
        .style(Styles::default());

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {question}"), Styles::default())),
        Line::from(""),
        Line::from(vec![
            Span::styled("  ", Styles::default()),
            Span::styled("[Enter/y]", Styles::key_hint()),
            Span::styled(" Confirm   ", Styles::default()),
            Span::styled("[Esc/n]", Styles::key_hint()),
            Span::styled(" Cancel", Styles::default()),
        ]),
    ];

    Paragraph::new(lines)
        .block(block)
        .style(Styles::default())
        .render(overlay_area, buf);
}
