//! UI rendering for the chat shell

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, Pane};
use super::compose;
use super::messages;
use super::sidebar;

/// Connection indicator symbol and color.
fn connection_indicator(connected: bool) -> (&'static str, Color) {
    if connected {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: header (1 line) + main content + status bar (1 line)
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(28), Constraint::Fill(1)]).areas(main_area);

    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        app.loader.contacts(),
        app.active.as_ref().map(|c| c.id.as_str()),
        app.active_pane == Pane::Contacts,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    let contact_name = app.active.as_ref().map(|c| c.name.as_str());
    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        contact_name,
        app.thread(),
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        contact_name,
        app.active_pane == Pane::Compose,
    );

    render_status(status_area, frame.buffer_mut(), app);
}

/// Header: portal name on the left; role, user and connection on the right.
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " Portal Chat";
    let (symbol, color) = connection_indicator(app.connected);
    let conn_text = if app.connected { "live" } else { "offline" };

    let role = format!(" [{}] ", app.session.role.as_str());
    let conn = format!(" {} {} ", symbol, conn_text);
    let user = format!(" {} ", app.session.display_name());

    let right_width = role.width() + conn.width() + user.width();
    let padding = (area.width as usize).saturating_sub(title.width() + right_width);

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(role, Style::default().fg(Color::Gray)),
        Span::styled(conn, Style::default().fg(color)),
        Span::styled(user, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Status bar: the transient message if any, else pane and key hints.
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref status) = app.status {
        let style = if status.is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", status.text), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::Gray);
    let hint_style = Style::default().fg(Color::Gray);

    let line = Line::from(vec![
        Span::styled(
            format!(" Tab: {} ", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled("| ", sep_style),
        Span::styled("Enter: open/send ", hint_style),
        Span::styled("| ", sep_style),
        Span::styled("r: reload ", hint_style),
        Span::styled("| ", sep_style),
        Span::styled("q/Esc: quit", hint_style),
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, Session};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buf = terminal.backend().buffer();
        let area = buf.area;
        (area.top()..area.bottom())
            .map(|y| {
                (area.left()..area.right())
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_header_shows_role_user_and_connection() {
        let mut session = Session::new("tok", Role::Company);
        session.user_name = Some("Acme HR".to_string());
        let app = App::new(session);

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("Portal Chat"));
        assert!(text.contains("[company]"));
        assert!(text.contains("Acme HR"));
        assert!(text.contains("offline"));
        assert!(text.contains("Loading..."));
    }

    #[test]
    fn test_status_message_replaces_hints() {
        let mut app = App::new(Session::new("tok", Role::Student));
        app.set_error("Failed to load contacts: boom");

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("Failed to load contacts: boom"));
        assert!(!text.contains("r: reload"));
    }
}
