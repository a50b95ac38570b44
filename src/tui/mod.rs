//! Chat shell: terminal user interface using Ratatui.
//!
//! Header, contact list, message thread and composer. Contacts and history come
//! from the REST backend task; live messages arrive through the room socket.

mod app;
mod backend;
mod compose;
mod log_capture;
mod messages;
mod sidebar;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;

pub use log_capture::LogBuffer;

use crate::api::PortalClient;
use crate::chat::{self, MessageHandler, RoomChannel};
use crate::models::ChatMessage;
use app::{Action, App};
use backend::{Backend, BackendCommand};
use log_capture::LogFile;

/// Redraw and housekeeping interval.
const TICK: Duration = Duration::from_millis(250);

/// Run the chat shell until the user quits or the session expires.
pub async fn run(log: LogBuffer) -> Result<()> {
    let client = PortalClient::authenticated()?;
    let session = client
        .session()
        .load()
        .context("Not logged in. Run 'portal-cli login' first.")?;

    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, client, App::new(session), &log).await;
    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    client: PortalClient,
    mut app: App,
    log: &LogBuffer,
) -> Result<()> {
    let client = Arc::new(client);
    let mut log_file = LogFile::open();

    let mut backend = Backend::start(
        Arc::clone(&client),
        app.session.role,
        app.session.user_id.clone(),
    );

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    let handler: MessageHandler = Arc::new(move |msg: ChatMessage| {
        let _ = chat_tx.send(msg);
    });
    let mut channel = RoomChannel::new(
        client.base_url(),
        Some(app.session.token.clone()),
        app.session.user_id.clone(),
        handler,
    );

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);

    backend.send(BackendCommand::LoadContacts);

    while !app.should_exit {
        app.connected = channel.is_connected();
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = app.on_key(key) {
                        perform(action, &mut app, &mut channel, &backend);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Failed to read terminal events"),
                None => break,
            },
            Some(resp) = backend.recv() => app.apply(resp),
            Some(msg) = chat_rx.recv() => app.on_chat_message(msg),
            _ = tick.tick() => {
                log_file.persist(log.drain());
                if app.logout_due(std::time::Instant::now()) {
                    app.should_exit = true;
                }
            }
        }
    }

    channel.close();
    log_file.persist(log.drain());
    Ok(())
}

/// Carry out an action produced by a key press.
fn perform(action: Action, app: &mut App, channel: &mut RoomChannel, backend: &Backend) {
    match action {
        Action::Quit => app.should_exit = true,
        Action::Reload => {
            app.sidebar.loading = true;
            backend.send(BackendCommand::LoadContacts);
        }
        Action::Open(contact) => {
            if let Err(e) = channel.set_room(contact.room_name.clone(), &contact.conversation_key()) {
                app.set_error(format!("{:#}", e));
            }
            if !app.loader.is_loaded(&contact) {
                app.messages.loading = true;
                backend.send(BackendCommand::LoadMessages { contact });
            }
        }
        Action::Send { contact, text } => match chat::try_socket_send(channel, &contact, &text) {
            Ok(()) => app.set_status("Sent"),
            Err(e) => {
                tracing::debug!("Socket send unavailable ({}), using REST", e);
                backend.send(BackendCommand::SendMessage { contact, text });
            }
        },
    }
}
