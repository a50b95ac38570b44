//! Chat contact model

use serde::{Deserialize, Serialize};

/// The counterpart of a conversation: a company for students, a student for companies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContact {
    pub id: String,
    pub name: String,
    pub subtitle: Option<String>,
    pub last_message_at: Option<String>,
    pub avatar: Option<String>,
    pub unread: Option<u32>,
    /// Server-assigned WebSocket room for this pair, when one exists.
    pub room_name: Option<String>,
}

impl ChatContact {
    /// Key under which this contact's conversation is stored.
    ///
    /// The room name wins when present so socket frames and REST history land in the
    /// same thread.
    pub fn conversation_key(&self) -> String {
        match self.room_name.as_deref() {
            Some(room) if !room.is_empty() => room.to_string(),
            _ => self.id.clone(),
        }
    }

    /// Numeric recipient id used by the socket protocol, if the contact id is numeric.
    pub fn recipient_id(&self) -> Option<i64> {
        self.id.trim().parse().ok()
    }
}
