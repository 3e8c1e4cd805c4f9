//! Theme and styling definitions for the banter TUI.

use ratatui::style::{Color, Modifier, Style};

/// Color palette for the TUI.
pub struct Palette;

impl Palette {
    // Base colors
    pub const BG: Color = Color::Rgb(30, 30, 40);
    pub const FG: Color = Color::Rgb(220, 220, 230);
    pub const DIM: Color = Color::Rgb(140, 140, 160);

    // Accent colors
    pub const ACCENT: Color = Color::Rgb(130, 170, 255);

    // Bubbles
    pub const USER_BUBBLE: Color = Color::Rgb(59, 130, 246);
    pub const USER_TEXT: Color = Color::Rgb(255, 255, 255);
    pub const BOT_BUBBLE: Color = Color::Rgb(55, 55, 70);

    // Status bar colors (high contrast)
    pub const STATUS_BG: Color = Color::Rgb(45, 45, 60);
    pub const STATUS_KEY_BG: Color = Color::Rgb(70, 90, 140);

    pub const WARNING: Color = Color::Rgb(240, 200, 100);

    // Border colors
    pub const BORDER: Color = Color::Rgb(80, 80, 100);
    pub const BORDER_ACTIVE: Color = Color::Rgb(130, 170, 255);
}

/// Frames of the typing indicator.
pub const TYPING_FRAMES: [&str; 3] = ["●∙∙", "∙●∙", "∙∙●"];

/// Common styles used throughout the TUI.
pub struct Styles;

impl Styles {
    /// Default text style.
    pub fn default() -> Style {
        Style::default().fg(Palette::FG).bg(Palette::BG)
    }

    /// Dimmed text for secondary information.
    pub fn dim() -> Style {
        Style::default().fg(Palette::DIM).bg(Palette::BG)
    }

    /// Active/focused element.
    pub fn active() -> Style {
        Style::default().fg(Palette::ACCENT).bg(Palette::BG)
    }

    /// Warning text on the status bar.
    pub fn warning() -> Style {
        Style::default().fg(Palette::WARNING).bg(Palette::STATUS_BG)
    }

    /// Title style.
    pub fn title() -> Style {
        Style::default()
            .fg(Palette::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    /// Text inside a user bubble.
    pub fn user_bubble() -> Style {
        Style::default()
            .fg(Palette::USER_TEXT)
            .bg(Palette::USER_BUBBLE)
    }

    /// Text inside a bot bubble.
    pub fn bot_bubble() -> Style {
        Style::default().fg(Palette::FG).bg(Palette::BOT_BUBBLE)
    }

    /// Link label, layered on top of a bubble style.
    pub fn link(base: Style) -> Style {
        base.add_modifier(Modifier::UNDERLINED | Modifier::BOLD)
    }

    /// Key hint style (for status bar) - bright on dark for visibility.
    pub fn key_hint() -> Style {
        Style::default()
            .fg(Palette::FG)
            .bg(Palette::STATUS_KEY_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Key hint label style - readable on status bar background.
    pub fn key_label() -> Style {
        Style::default().fg(Palette::FG).bg(Palette::STATUS_BG)
    }

    /// Status bar background style.
    pub fn status_bar() -> Style {
        Style::default().fg(Palette::FG).bg(Palette::STATUS_BG)
    }

    /// Border style for inactive elements.
    pub fn border() -> Style {
        Style::default().fg(Palette::BORDER)
    }

    /// Border style for active/focused elements.
    pub fn border_active() -> Style {
        Style::default().fg(Palette::BORDER_ACTIVE)
    }
}

/// Typing indicator frame for a tick count.
pub fn typing_frame(tick: usize) -> &'static str {
    TYPING_FRAMES[tick % TYPING_FRAMES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_frame_cycles() {
        assert_eq!(typing_frame(0), TYPING_FRAMES[0]);
        assert_eq!(typing_frame(1), TYPING_FRAMES[1]);
        assert_eq!(typing_frame(3), TYPING_FRAMES[0]);
    }

    #[test]
    fn test_link_style_keeps_bubble_colors() {
        let style = Styles::link(Styles::user_bubble());
        assert_eq!(style.bg, Some(Palette::USER_BUBBLE));
        assert!(style.add_modifier.contains(Modifier::UNDERLINED));
    }
}
