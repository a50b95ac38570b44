//! Real-time chat: contact loading, room sockets and sending with REST fallback

pub mod channel;
pub mod loader;
pub mod wire;

pub use channel::{ChannelError, MessageHandler, RoomChannel};
pub use loader::ConversationLoader;

use crate::api::ApiError;
use crate::auth::Role;
use crate::models::{ChatContact, ChatMessage, MessageStatus};

/// REST side of chat. Implemented by `PortalClient`.
#[allow(async_fn_in_trait)]
pub trait ChatBackend {
    /// Contacts visible to `role` (companies for students, students for companies).
    async fn list_contacts(&self, role: Role) -> Result<Vec<ChatContact>, ApiError>;

    /// Full history with `contact`, oldest first.
    async fn list_messages(
        &self,
        contact: &ChatContact,
        current_user_id: Option<&str>,
    ) -> Result<Vec<ChatMessage>, ApiError>;

    /// Send over REST. Returns the stored message when the server echoes it.
    async fn send_message(
        &self,
        contact: &ChatContact,
        text: &str,
        current_user_id: Option<&str>,
    ) -> Result<Option<ChatMessage>, ApiError>;
}

/// Which transport carried a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPath {
    Socket,
    Rest,
}

/// Try the open room socket. Fails when the socket is down, belongs to another room,
/// or the contact has no numeric id.
pub fn try_socket_send(
    channel: &RoomChannel,
    contact: &ChatContact,
    text: &str,
) -> Result<(), ChannelError> {
    let recipient = contact.recipient_id().ok_or(ChannelError::NotConnected)?;
    if contact.room_name.is_some() && channel.room() != contact.room_name.as_deref() {
        return Err(ChannelError::NotConnected);
    }
    channel.send(text, recipient)
}

/// Send over REST and return the message to show in the thread.
pub async fn rest_send<B: ChatBackend>(
    backend: &B,
    contact: &ChatContact,
    text: &str,
    current_user_id: Option<&str>,
) -> Result<ChatMessage, ApiError> {
    let stored = backend.send_message(contact, text, current_user_id).await?;
    Ok(stored.unwrap_or_else(|| local_message(contact, text, current_user_id)))
}

/// Send `text` to `contact`: socket first, REST when the socket is unavailable.
///
/// A socket send is not appended locally; the server echoes it back into the room.
/// A REST send is appended to the conversation right away.
pub async fn send_text<B: ChatBackend>(
    channel: Option<&RoomChannel>,
    backend: &B,
    loader: &mut ConversationLoader,
    contact: &ChatContact,
    text: &str,
) -> Result<SendPath, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("Message is empty".to_string()));
    }

    if let Some(channel) = channel {
        match try_socket_send(channel, contact, text) {
            Ok(()) => return Ok(SendPath::Socket),
            Err(e) => tracing::debug!("Socket send unavailable ({}), using REST", e),
        }
    }

    let current_user_id = loader.current_user_id().map(String::from);
    let mut message = rest_send(backend, contact, text, current_user_id.as_deref()).await?;
    message.conversation_id = contact.conversation_key();
    loader.append(message);
    Ok(SendPath::Rest)
}

/// Message built locally for a REST send the server did not echo.
pub fn local_message(contact: &ChatContact, text: &str, current_user_id: Option<&str>) -> ChatMessage {
    ChatMessage {
        id: format!("local-{}", uuid::Uuid::new_v4()),
        conversation_id: contact.conversation_key(),
        sender_id: current_user_id.unwrap_or_default().to_string(),
        text: Some(text.to_string()),
        attachment: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
        is_own: true,
        status: Some(MessageStatus::Sent),
    }
}
