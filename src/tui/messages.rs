//! Messages pane: the open conversation, oldest at the top.

use std::cell::Cell;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::models::{ChatMessage, MessageStatus};

/// Lines moved per Up/Down press.
const SCROLL_STEP: usize = 3;

/// State for the messages pane.
#[derive(Default)]
pub struct MessagesState {
    /// Whether history for the open contact is being fetched.
    pub loading: bool,
    /// Lines scrolled up from the newest message (0 = pinned to the bottom).
    pub scroll_from_bottom: usize,
    /// Furthest scroll that still moves the view, as of the last render.
    max_scroll: Cell<usize>,
}

impl MessagesState {
    pub fn scroll_up(&mut self) {
        self.scroll_from_bottom = self
            .scroll_from_bottom
            .saturating_add(SCROLL_STEP)
            .min(self.max_scroll.get());
    }

    pub fn scroll_down(&mut self) {
        self.scroll_from_bottom = self
            .scroll_from_bottom
            .min(self.max_scroll.get())
            .saturating_sub(SCROLL_STEP);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_from_bottom = 0;
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the thread for `contact_name` into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &MessagesState,
    contact_name: Option<&str>,
    thread: &[ChatMessage],
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);
    state.max_scroll.set(0);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    // Reserve the first line for the conversation header.
    let header = contact_name.unwrap_or("No conversation selected");
    render_header(Rect::new(inner.x, inner.y, inner.width, 1), buf, header);

    let body = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if body.height == 0 {
        return;
    }

    if thread.is_empty() {
        let hint = match (contact_name, state.loading) {
            (None, _) => " Pick a contact and press Enter",
            (Some(_), true) => " Loading messages...",
            (Some(_), false) => " No messages yet. Say hello!",
        };
        let line = Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(body.x, body.y, body.width, 1), buf);
        return;
    }

    let lines = build_lines(thread, contact_name.unwrap_or("Them"), body.width as usize);
    let visible = body.height as usize;
    state.max_scroll.set(lines.len().saturating_sub(visible));
    let start = visible_start(lines.len(), visible, state.scroll_from_bottom);

    for (row, line) in lines.iter().skip(start).take(visible).enumerate() {
        let line_area = Rect::new(body.x, body.y + row as u16, body.width, 1);
        Paragraph::new(line.clone()).render(line_area, buf);
    }

    // Scroll indicators.
    let indicator_x = body.x + body.width.saturating_sub(1);
    if start > 0 {
        let cell = &mut buf[(indicator_x, body.y)];
        cell.set_char('^');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
    if start + visible < lines.len() {
        let cell = &mut buf[(indicator_x, body.y + body.height - 1)];
        cell.set_char('v');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
}

fn render_header(area: Rect, buf: &mut Buffer, header: &str) {
    let line = Line::from(Span::styled(
        format!(" {} ", header),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// First line to draw so the bottom of the thread, minus the scroll, is visible.
fn visible_start(total: usize, visible: usize, scroll_from_bottom: usize) -> usize {
    let max_start = total.saturating_sub(visible);
    max_start.saturating_sub(scroll_from_bottom)
}

/// Flatten the thread into display lines. Own messages are right-aligned.
fn build_lines(thread: &[ChatMessage], contact_name: &str, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let content_width = width.saturating_sub(2).max(10);

    for msg in thread {
        let alignment = if msg.is_own {
            Alignment::Right
        } else {
            Alignment::Left
        };

        let sender = if msg.is_own { "You" } else { contact_name };
        let mut header = vec![
            Span::styled(
                sender.to_string(),
                Style::default()
                    .fg(if msg.is_own { Color::Cyan } else { Color::White })
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", msg.display_time()),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        if msg.status == Some(MessageStatus::Failed) {
            header.push(Span::styled("  (failed)", Style::default().fg(Color::Red)));
        }
        lines.push(pad(Line::from(header).alignment(alignment), msg.is_own));

        if let Some(ref text) = msg.text {
            for row in wrap_text(text, content_width) {
                lines.push(pad(Line::from(row).alignment(alignment), msg.is_own));
            }
        }
        if let Some(ref att) = msg.attachment {
            let label = Span::styled(
                format!("[file] {}", att.display_name()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::DIM),
            );
            lines.push(pad(Line::from(label).alignment(alignment), msg.is_own));
        }

        lines.push(Line::from(""));
    }

    lines
}

/// One column of margin on the side the line is aligned to.
fn pad(mut line: Line<'static>, own: bool) -> Line<'static> {
    if own {
        line.spans.push(Span::raw(" "));
    } else {
        line.spans.insert(0, Span::raw(" "));
    }
    line
}

/// Simple word-wrapping: split content by newlines first, then wrap long lines.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.chars().count() + 1 + word.chars().count() <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::message;
    use crate::models::Attachment;

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("short", 10), vec!["short"]);
        assert_eq!(
            wrap_text("one two three four", 9),
            vec!["one two", "three", "four"]
        );
        assert_eq!(wrap_text("a\nb", 5), vec!["a", "b"]);
    }

    #[test]
    fn test_own_messages_are_right_aligned() {
        let mut own = message("1", "room", "mine");
        own.is_own = true;
        let theirs = message("2", "room", "theirs");

        let lines = build_lines(&[own, theirs], "Acme", 40);
        assert_eq!(lines[0].alignment, Some(Alignment::Right));
        assert!(text_of(&lines[0]).starts_with("You"));
        assert_eq!(lines[3].alignment, Some(Alignment::Left));
        assert!(text_of(&lines[3]).contains("Acme"));
        assert!(text_of(&lines[4]).contains("theirs"));
    }

    #[test]
    fn test_attachment_rendered_as_file_label() {
        let mut msg = message("1", "room", "");
        msg.text = None;
        msg.attachment = Some(Attachment {
            url: "https://api.example.com/media/cv.pdf".to_string(),
            kind: "file".to_string(),
            name: None,
        });
        let lines = build_lines(&[msg], "Acme", 40);
        assert!(text_of(&lines[1]).contains("[file] cv.pdf"));
    }

    #[test]
    fn test_failed_status_is_shown() {
        let mut msg = message("1", "room", "oops");
        msg.status = Some(MessageStatus::Failed);
        let lines = build_lines(&[msg], "Acme", 40);
        assert!(text_of(&lines[0]).contains("(failed)"));
    }

    #[test]
    fn test_visible_start_pins_to_bottom() {
        assert_eq!(visible_start(30, 10, 0), 20);
        assert_eq!(visible_start(30, 10, 6), 14);
        assert_eq!(visible_start(30, 10, 100), 0);
        assert_eq!(visible_start(5, 10, 0), 0);
    }

    #[test]
    fn test_scroll_stops_at_top_of_thread() {
        let thread: Vec<ChatMessage> = (0..6)
            .map(|i| message(&i.to_string(), "room", "hello there"))
            .collect();
        let mut state = MessagesState::default();
        let area = Rect::new(0, 0, 40, 8);
        let mut buf = Buffer::empty(area);
        render(area, &mut buf, &state, Some("Acme"), &thread, true);

        // 6 messages x 3 lines in a 5-line body.
        let max = 18 - 5;
        assert_eq!(state.max_scroll.get(), max);

        for _ in 0..20 {
            state.scroll_up();
        }
        assert_eq!(state.scroll_from_bottom, max);

        state.scroll_down();
        assert_eq!(state.scroll_from_bottom, max - SCROLL_STEP);
    }

    #[test]
    fn test_no_scroll_before_render() {
        let mut state = MessagesState::default();
        state.scroll_up();
        assert_eq!(state.scroll_from_bottom, 0);
    }
}
