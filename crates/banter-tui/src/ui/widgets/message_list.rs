//! Chat bubble list widget.

use crate::ui::theme::{typing_frame, Styles};
use banter_engine::{segments, Message, Segment};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Narrowest bubble, padding included.
const MIN_BUBBLE_WIDTH: usize = 12;

/// Renders the conversation as chat bubbles, newest at the bottom.
///
/// User messages hug the right edge, bot messages the left. `scroll` counts
/// lines up from the bottom; zero follows the newest message.
#[derive(Debug, Clone)]
pub struct MessageList<'a> {
    messages: &'a [Message],
    typing: Option<usize>,
    scroll: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        Self {
            messages,
            typing: None,
            scroll: 0,
        }
    }

    /// Show the typing indicator at the given animation tick.
    #[must_use]
    pub fn typing(mut self, tick: usize) -> Self {
        self.typing = Some(tick);
        self
    }

    #[must_use]
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Largest useful scroll offset for an area.
    pub fn max_scroll(&self, area: Rect) -> usize {
        self.lines(area.width)
            .len()
            .saturating_sub(usize::from(area.height))
    }

    /// Lay out every message for the given width.
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let width = usize::from(width);
        let mut lines = Vec::new();

        for message in self.messages {
            let base = if message.is_user() {
                Styles::user_bubble()
            } else {
                Styles::bot_bubble()
            };
            let label = if message.is_user() { "You" } else { "Bot" };
            push_bubble(
                &mut lines,
                label,
                &styled_chars(&message.text, base),
                base,
                message.is_user(),
                width,
            );
        }

        if let Some(tick) = self.typing {
            let base = Styles::bot_bubble();
            let dots: Vec<(char, Style)> = typing_frame(tick).chars().map(|c| (c, base)).collect();
            push_bubble(&mut lines, "Bot", &dots, base, false, width);
        }

        lines
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 || area.width < 1 {
            return;
        }

        let lines = self.lines(area.width);
        let height = usize::from(area.height);
        let max_scroll = lines.len().saturating_sub(height);
        let scroll = self.scroll.min(max_scroll);
        let start = lines.len().saturating_sub(height + scroll);

        for (y, line) in (area.y..area.y + area.height).zip(lines.iter().skip(start)) {
            buf.set_line(area.x, y, line, area.width);
        }
    }
}

/// Message text as styled characters, link labels highlighted.
fn styled_chars(text: &str, base: Style) -> Vec<(char, Style)> {
    let mut chars = Vec::new();
    for segment in segments(text) {
        match segment {
            Segment::Text(t) => chars.extend(t.chars().map(|c| (c, base))),
            Segment::Link { label, .. } => {
                let style = Styles::link(base);
                chars.extend(label.chars().map(|c| (c, style)));
            }
        }
    }
    chars
}

fn push_bubble(
    lines: &mut Vec<Line<'static>>,
    label: &'static str,
    chars: &[(char, Style)],
    base: Style,
    right: bool,
    width: usize,
) {
    let bubble_max = (width * 3 / 4).max(MIN_BUBBLE_WIDTH).min(width);
    let rows = wrap_styled(chars, bubble_max.saturating_sub(2).max(1));
    let inner = rows.iter().map(|row| row_width(row)).max().unwrap_or(0);
    let outer = inner + 2;
    let indent = if right {
        width.saturating_sub(outer)
    } else {
        0
    };

    let label_indent = if right {
        width.saturating_sub(label.width())
    } else {
        0
    };
    lines.push(Line::from(vec![
        Span::raw(" ".repeat(label_indent)),
        Span::styled(label, Styles::dim()),
    ]));

    for row in rows {
        let mut spans = Vec::new();
        if indent > 0 {
            spans.push(Span::raw(" ".repeat(indent)));
        }
        spans.push(Span::styled(" ", base));
        spans.extend(group_spans(&row));
        let fill = inner - row_width(&row) + 1;
        spans.push(Span::styled(" ".repeat(fill), base));
        lines.push(Line::from(spans));
    }

    lines.push(Line::default());
}

fn row_width(row: &[(char, Style)]) -> usize {
    row.iter().map(|(c, _)| c.width().unwrap_or(0)).sum()
}

/// Merge runs of equally styled characters into spans.
fn group_spans(row: &[(char, Style)]) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    let mut current_style: Option<Style> = None;

    for &(c, style) in row {
        if current_style.is_some_and(|s| s != style) {
            if let Some(s) = current_style {
                spans.push(Span::styled(std::mem::take(&mut current), s));
            }
        }
        current_style = Some(style);
        current.push(c);
    }
    if let Some(s) = current_style {
        spans.push(Span::styled(current, s));
    }
    spans
}

/// Word-wrap styled characters to `width` columns.
///
/// Wrapping runs on the plain text; styles are carried back by walking the
/// source alongside each wrapped row, skipping the whitespace and newlines
/// the wrapper dropped.
fn wrap_styled(chars: &[(char, Style)], width: usize) -> Vec<Vec<(char, Style)>> {
    let plain: String = chars.iter().map(|(c, _)| *c).collect();
    let fallback = chars.first().map(|(_, s)| *s).unwrap_or_default();

    let mut rows = Vec::new();
    let mut idx = 0;
    for wrapped in textwrap::wrap(&plain, textwrap::Options::new(width)) {
        let mut row = Vec::new();
        for c in wrapped.chars() {
            match chars[idx..].iter().position(|(source, _)| *source == c) {
                Some(offset) => {
                    row.push((c, chars[idx + offset].1));
                    idx += offset + 1;
                }
                None => row.push((c, fallback)),
            }
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::buffer_to_string;
    use banter_engine::Sender;
    use ratatui::style::Modifier;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn render(list: MessageList<'_>, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        list.render(area, &mut buf);
        buffer_to_string(&buf)
    }

    #[test]
    fn test_user_right_bot_left() {
        let messages = vec![
            Message::new(1, "Hello", Sender::Bot),
            Message::new(2, "Hi", Sender::User),
        ];
        let lines = MessageList::new(&messages).lines(40);

        assert_eq!(line_text(&lines[0]), "Bot");
        assert_eq!(line_text(&lines[1]), " Hello ");
        assert_eq!(line_text(&lines[3]).trim_start(), "You");
        assert_eq!(line_text(&lines[3]).len(), 40);

        let user_row = line_text(&lines[4]);
        assert_eq!(user_row.len(), 40);
        assert!(user_row.ends_with(" Hi "));
    }

    #[test]
    fn test_long_text_wraps_inside_bubble() {
        let text = "one two three four five six seven eight nine ten";
        let messages = vec![Message::new(1, text, Sender::Bot)];
        let lines = MessageList::new(&messages).lines(24);

        // label, wrapped rows, spacer
        assert!(lines.len() > 3);
        for row in &lines[1..lines.len() - 1] {
            assert!(line_text(row).width() <= 18);
        }
        let words: Vec<String> = lines[1..lines.len() - 1]
            .iter()
            .flat_map(|l| {
                line_text(l)
                    .split_whitespace()
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(words.join(" "), text);
    }

    #[test]
    fn test_link_label_underlined() {
        let messages = vec![Message::new(
            1,
            "See [my site](https://x.com)",
            Sender::Bot,
        )];
        let lines = MessageList::new(&messages).lines(60);
        let row = &lines[1];

        assert_eq!(line_text(row), " See my site ");
        let link = row
            .spans
            .iter()
            .find(|s| s.content == "my site")
            .unwrap();
        assert!(link.style.add_modifier.contains(Modifier::UNDERLINED));
        let plain = row.spans.iter().find(|s| s.content == "See ").unwrap();
        assert!(!plain.style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_bare_url_uses_fixed_label() {
        let messages = vec![Message::new(1, "https://x.com/cv.pdf", Sender::Bot)];
        let lines = MessageList::new(&messages).lines(60);
        assert_eq!(line_text(&lines[1]), " Click here to view/download ");
    }

    #[test]
    fn test_multiline_text_keeps_breaks() {
        let messages = vec![Message::new(1, "first\nsecond", Sender::Bot)];
        let lines = MessageList::new(&messages).lines(40);
        assert_eq!(line_text(&lines[1]), " first  ");
        assert_eq!(line_text(&lines[2]), " second ");
    }

    #[test]
    fn test_typing_indicator_appended() {
        let messages = vec![Message::new(1, "Hi", Sender::User)];
        let lines = MessageList::new(&messages).typing(1).lines(40);
        let text: Vec<String> = lines.iter().map(line_text).collect();
        assert!(text.iter().any(|l| l.contains(typing_frame(1))));
    }

    #[test]
    fn test_render_follows_newest() {
        let messages: Vec<Message> = (0..10)
            .map(|i| Message::new(i, format!("message {i}"), Sender::Bot))
            .collect();
        let output = render(MessageList::new(&messages), 40, 6);
        assert!(output.contains("message 9"));
        assert!(!output.contains("message 0"));
    }

    #[test]
    fn test_render_scroll_is_clamped() {
        let messages: Vec<Message> = (0..10)
            .map(|i| Message::new(i, format!("message {i}"), Sender::Bot))
            .collect();
        let list = MessageList::new(&messages).scroll(1000);
        let max = list.max_scroll(Rect::new(0, 0, 40, 6));
        assert_eq!(max, 30 - 6);

        let output = render(list, 40, 6);
        assert!(output.starts_with("Bot"));
        assert!(output.contains("message 0"));
    }
}
