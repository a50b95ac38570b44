//! Contact list pane with unread badges.

use std::collections::HashSet;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::models::ChatContact;

/// Sidebar state: selection over the loader's contact list.
pub struct SidebarState {
    /// Index into the contact list (0-based).
    pub selected: usize,
    /// Whether a contact fetch is in flight.
    pub loading: bool,
    /// Contacts opened in this session; their server unread count is stale.
    seen: HashSet<String>,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self {
            selected: 0,
            loading: true,
            seen: HashSet::new(),
        }
    }
}

impl SidebarState {
    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, count: usize) {
        if self.selected + 1 < count {
            self.selected += 1;
        }
    }

    /// Keep the selection in range after the list is replaced.
    pub fn clamp(&mut self, count: usize) {
        self.selected = self.selected.min(count.saturating_sub(1));
    }

    pub fn mark_seen(&mut self, contact_id: &str) {
        self.seen.insert(contact_id.to_string());
    }

    /// Badge count for a contact: the server's unread count until it is opened.
    pub fn unread(&self, contact: &ChatContact) -> u32 {
        if self.seen.contains(&contact.id) {
            0
        } else {
            contact.unread.unwrap_or(0)
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the contact list into the given area.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &SidebarState,
    contacts: &[ChatContact],
    active_id: Option<&str>,
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
        .title(" Contacts ")
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if contacts.is_empty() {
        let text = if state.loading { " Loading..." } else { " (no contacts)" };
        let line = Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    let available_height = inner.height as usize;
    let scroll_offset = compute_scroll_offset(state.selected, available_height, contacts.len());

    for (row_idx, idx) in (scroll_offset..contacts.len())
        .take(available_height)
        .enumerate()
    {
        let contact = &contacts[idx];
        let selected = idx == state.selected;
        let is_active = active_id == Some(contact.id.as_str());
        let unread = state.unread(contact);

        let cursor = if selected && focused { "\u{25BA}" } else { " " };
        let marker = if is_active { "*" } else { " " };
        let label = format!("{}{} {}", cursor, marker, contact.name);
        let badge = if unread > 0 {
            unread.to_string()
        } else {
            String::new()
        };

        let style = item_style(selected, unread > 0);
        let bstyle = if unread > 0 { badge_style(selected) } else { style };
        let row = Rect::new(inner.x, inner.y + row_idx as u16, inner.width, 1);
        render_row(buf, row, &label, &badge, style, bstyle);
    }
}

/// Simple scroll offset: keep selected item visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    let max_offset = total.saturating_sub(height);
    selected.saturating_sub(height - 1).min(max_offset)
}

fn item_style(selected: bool, has_unread: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if has_unread {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn badge_style(selected: bool) -> Style {
    let style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    if selected {
        style.bg(Color::DarkGray)
    } else {
        style
    }
}

/// Render a row with left-aligned text and an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_len = badge.len();
    let max_left = if badge_len > 0 {
        width.saturating_sub(badge_len + 1)
    } else {
        width
    };

    let left_truncated: String = left.chars().take(max_left).collect();
    let left_len = left_truncated.chars().count();
    let pad = width.saturating_sub(left_len + badge_len);

    let line = Line::from(vec![
        Span::styled(left_truncated, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);

    Paragraph::new(line).render(area, buf);
}
