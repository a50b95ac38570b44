//! Chat shell state and key handling

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::backend::BackendResponse;
use super::compose::ComposeState;
use super::messages::MessagesState;
use super::sidebar::SidebarState;
use crate::api::ApiError;
use crate::auth::Session;
use crate::chat::{self, ConversationLoader};
use crate::models::{ChatContact, ChatMessage, MessageStatus};

/// How long the "session expired" notice stays up before the shell exits.
pub const LOGOUT_DELAY: Duration = Duration::from_secs(3);

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Contacts,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Contacts => "contacts",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Contacts => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Contacts,
        }
    }

    fn prev(self) -> Self {
        match self {
            Pane::Contacts => Pane::Compose,
            Pane::Messages => Pane::Contacts,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// Side effects requested by a key press; carried out by the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Reload,
    Open(ChatContact),
    Send { contact: ChatContact, text: String },
}

/// Transient status-bar message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

/// Application state
pub struct App {
    pub should_exit: bool,
    pub session: Session,
    pub active_pane: Pane,
    /// Whether the room socket is open (refreshed every frame).
    pub connected: bool,
    pub loader: ConversationLoader,
    pub active: Option<ChatContact>,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub status: Option<Status>,
    /// Set once the session is rejected; the shell exits when it passes.
    pub logout_at: Option<Instant>,
}

impl App {
    pub fn new(session: Session) -> Self {
        Self {
            should_exit: false,
            loader: ConversationLoader::new(session.user_id.clone()),
            session,
            active_pane: Pane::default(),
            connected: false,
            active: None,
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            status: None,
            logout_at: None,
        }
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: false,
        });
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: true,
        });
    }

    /// Messages of the open conversation.
    pub fn thread(&self) -> &[ChatMessage] {
        match self.active {
            Some(ref c) => self.loader.messages(&c.conversation_key()),
            None => &[],
        }
    }

    pub fn logout_due(&self, now: Instant) -> bool {
        self.logout_at.is_some_and(|at| now >= at)
    }

    /// Handle a key press. Returns the side effect to perform, if any.
    pub fn on_key(&mut self, key: KeyEvent) -> Option<Action> {
        if self.logout_at.is_some() {
            return None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return Some(Action::Quit),
            KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Tab => {
                self.active_pane = self.active_pane.next();
                return None;
            }
            KeyCode::BackTab => {
                self.active_pane = self.active_pane.prev();
                return None;
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Contacts => self.on_contacts_key(key),
            Pane::Messages => self.on_messages_key(key),
            Pane::Compose => self.on_compose_key(key, ctrl),
        }
    }

    fn on_contacts_key(&mut self, key: KeyEvent) -> Option<Action> {
        let count = self.loader.contacts().len();
        match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Reload),
            KeyCode::Up | KeyCode::Char('k') => {
                self.sidebar.move_up();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.sidebar.move_down(count);
                None
            }
            KeyCode::Enter => {
                let contact = self.loader.contacts().get(self.sidebar.selected)?.clone();
                self.open(contact.clone());
                Some(Action::Open(contact))
            }
            _ => None,
        }
    }

    fn on_messages_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Reload),
            KeyCode::Up | KeyCode::Char('k') => {
                self.messages.scroll_up();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.messages.scroll_down();
                None
            }
            KeyCode::End => {
                self.messages.scroll_to_bottom();
                None
            }
            _ => None,
        }
    }

    fn on_compose_key(&mut self, key: KeyEvent, ctrl: bool) -> Option<Action> {
        match key.code {
            KeyCode::Enter => {
                let Some(contact) = self.active.clone() else {
                    self.set_error("Select a contact first");
                    return None;
                };
                let text = self.compose.send()?;
                self.messages.scroll_to_bottom();
                Some(Action::Send { contact, text })
            }
            KeyCode::Char('u') if ctrl => {
                self.compose.clear();
                None
            }
            KeyCode::Char(c) if !ctrl => {
                self.compose.insert_char(c);
                None
            }
            KeyCode::Backspace => {
                self.compose.backspace();
                None
            }
            KeyCode::Delete => {
                self.compose.delete();
                None
            }
            KeyCode::Left => {
                self.compose.move_left();
                None
            }
            KeyCode::Right => {
                self.compose.move_right();
                None
            }
            KeyCode::Home => {
                self.compose.move_home();
                None
            }
            KeyCode::End => {
                self.compose.move_end();
                None
            }
            _ => None,
        }
    }

    /// Make `contact` the open conversation and move focus to the composer.
    fn open(&mut self, contact: ChatContact) {
        self.sidebar.mark_seen(&contact.id);
        self.messages.scroll_to_bottom();
        self.active_pane = Pane::Compose;
        self.status = None;
        self.active = Some(contact);
    }

    /// Apply a backend response.
    pub fn apply(&mut self, resp: BackendResponse) {
        match resp {
            BackendResponse::Contacts(result) => {
                self.sidebar.loading = false;
                match result {
                    Ok(contacts) => {
                        let count = contacts.len();
                        self.loader.set_contacts(contacts);
                        self.sidebar.clamp(count);
                        if count == 0 {
                            self.set_status("No contacts yet");
                        }
                    }
                    Err(e) => self.fail("Failed to load contacts", &e),
                }
            }
            BackendResponse::Messages { contact, result } => {
                self.messages.loading = false;
                match result {
                    Ok(history) => self.loader.set_history(&contact.conversation_key(), history),
                    Err(e) => self.fail("Failed to load messages", &e),
                }
            }
            BackendResponse::MessageSent {
                contact,
                text,
                result,
            } => match result {
                Ok(mut msg) => {
                    msg.conversation_id = contact.conversation_key();
                    self.loader.append(msg);
                    self.set_status("Sent");
                }
                Err(e) => {
                    let mut failed =
                        chat::local_message(&contact, &text, self.loader.current_user_id());
                    failed.status = Some(MessageStatus::Failed);
                    self.loader.append(failed);
                    self.fail("Failed to send", &e);
                }
            },
        }
    }

    /// A message delivered by the room socket.
    pub fn on_chat_message(&mut self, msg: ChatMessage) {
        self.loader.append(msg);
    }

    fn fail(&mut self, what: &str, err: &ApiError) {
        tracing::warn!("{}: {}", what, err);
        if err.is_unauthorized() {
            // The client already dropped the stored session.
            self.set_error("Session expired. Run 'portal-cli login' to sign in again.");
            self.logout_at = Some(Instant::now() + LOGOUT_DELAY);
        } else {
            self.set_error(format!("{}: {}", what, err));
        }
    }
}
