//! Compose box: single-line message input with cursor editing.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
}

impl ComposeState {
    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(prev_byte_pos..byte_pos);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character at the cursor (delete key).
    pub fn delete(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor_pos < char_count {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(byte_pos..next_byte_pos);
        }
    }

    /// Move cursor left by one character.
    pub fn move_left(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
        }
    }

    /// Move cursor right by one character.
    pub fn move_right(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor_pos < char_count {
            self.cursor_pos += 1;
        }
    }

    /// Move cursor to the beginning of the input.
    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    /// Move cursor to the end of the input.
    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    /// Clear all input text (Ctrl+U).
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Take the trimmed text and clear the box. Whitespace-only input stays put.
    pub fn send(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.input.clear();
        self.cursor_pos = 0;
        Some(text)
    }

    /// Convert a char-based cursor position to a byte offset.
    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Height of the compose box: border + input line + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Render the compose box. Uses `Frame` directly so the cursor can be placed.
pub fn render(
    area: Rect,
    frame: &mut Frame,
    state: &ComposeState,
    recipient: Option<&str>,
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
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let display = compose_display_text(&state.input, state.cursor_pos, input_area.width as usize);
    render_input(input_area, frame.buffer_mut(), state, &display, recipient);

    if focused {
        let x = input_area.x + 1 + display.cursor_offset as u16;
        frame.set_cursor_position((x.min(input_area.right().saturating_sub(1)), input_area.y));
    }
}

fn render_input(
    area: Rect,
    buf: &mut Buffer,
    state: &ComposeState,
    display: &DisplayText,
    recipient: Option<&str>,
) {
    let line = if state.input.is_empty() {
        let placeholder = match recipient {
            Some(name) => format!(" Type a message to {}...", name),
            None => " Select a contact to start chatting".to_string(),
        };
        Line::from(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ))
    };
    Paragraph::new(line).render(area, buf);
}

/// What to show of the input and where the cursor lands.
#[derive(Debug, PartialEq, Eq)]
struct DisplayText {
    visible: String,
    /// Cursor column within `visible`.
    cursor_offset: usize,
}

/// Visible slice of the input, scrolled horizontally to keep the cursor in view.
/// Widths are terminal columns, so wide characters count double.
fn compose_display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    // One column of left margin.
    let avail = width.saturating_sub(1);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let chars: Vec<char> = input.chars().collect();
    let col = |c: &char| c.width().unwrap_or(0);
    let cursor = cursor_pos.min(chars.len());

    // Drop characters from the left until the cursor column fits.
    let mut start = 0;
    let mut cursor_col: usize = chars[..cursor].iter().map(col).sum();
    while cursor_col >= avail && start < cursor {
        cursor_col -= col(&chars[start]);
        start += 1;
    }

    let mut used = 0;
    let visible: String = chars[start..]
        .iter()
        .take_while(|&&c| {
            used += col(&c);
            used <= avail
        })
        .collect();

    DisplayText {
        visible,
        cursor_offset: cursor_col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> ComposeState {
        let mut state = ComposeState::default();
        for c in text.chars() {
            state.insert_char(c);
        }
        state
    }

    #[test]
    fn test_editing_at_cursor() {
        let mut state = typed("helo");
        state.move_left();
        state.insert_char('l');
        assert_eq!(state.input, "hello");

        state.move_home();
        state.delete();
        assert_eq!(state.input, "ello");

        state.move_end();
        state.backspace();
        assert_eq!(state.input, "ell");
        assert_eq!(state.cursor_pos, 3);
    }

    #[test]
    fn test_multibyte_input() {
        let mut state = typed("héllo");
        state.move_home();
        state.move_right();
        state.move_right();
        state.backspace();
        assert_eq!(state.input, "hllo");
    }

    #[test]
    fn test_send_trims_and_clears() {
        let mut state = typed("  hi  ");
        assert_eq!(state.send().as_deref(), Some("hi"));
        assert!(state.input.is_empty());
        assert_eq!(state.cursor_pos, 0);

        let mut blank = typed("   ");
        assert_eq!(blank.send(), None);
        assert_eq!(blank.input, "   ");
    }

    #[test]
    fn test_display_scrolls_to_cursor() {
        let short = compose_display_text("hello", 5, 20);
        assert_eq!(short.visible, "hello");
        assert_eq!(short.cursor_offset, 5);

        let long = compose_display_text("abcdefghij", 10, 6);
        assert_eq!(long.cursor_offset, 4);
        assert_eq!(long.visible, "ghij");

        let home = compose_display_text("abcdefghij", 0, 6);
        assert_eq!(home.visible, "abcde");
        assert_eq!(home.cursor_offset, 0);
    }
}
