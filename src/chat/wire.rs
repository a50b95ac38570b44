//! Chat wire format: socket frames and REST message records, and the single
//! boundary that turns them into `ChatMessage`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Attachment, ChatMessage};

/// Frame types that carry a chat message.
const MESSAGE_KINDS: &[&str] = &["message", "chat_message", "attachment"];

/// Identifier that may arrive as a JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Int(i64),
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireId::Int(n) => write!(f, "{}", n),
            WireId::Text(s) => f.write_str(s.trim()),
        }
    }
}

/// Attachment as sent by the server: a bare URL or a described object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireAttachment {
    Url(String),
    Object {
        url: String,
        #[serde(rename = "type")]
        kind: Option<String>,
        name: Option<String>,
    },
}

impl WireAttachment {
    fn into_attachment(self) -> Option<Attachment> {
        match self {
            WireAttachment::Url(url) if url.trim().is_empty() => None,
            WireAttachment::Url(url) => Some(Attachment {
                url,
                kind: "file".to_string(),
                name: None,
            }),
            WireAttachment::Object { url, kind, name } => Some(Attachment {
                url,
                kind: kind
                    .filter(|k| !k.trim().is_empty())
                    .unwrap_or_else(|| "file".to_string()),
                name,
            }),
        }
    }
}

/// A message record. Socket frames set `type`; REST history rows usually do not.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub room_name: Option<String>,
    pub id: Option<WireId>,
    pub message: Option<String>,
    #[serde(alias = "created_at", alias = "timestamp")]
    pub sent_time: Option<String>,
    pub created_by: Option<WireId>,
    pub sender_id: Option<WireId>,
    pub attachment: Option<WireAttachment>,
}

/// Outbound socket frame: `{type: "message", message, recipient_id}`.
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: &'a str,
    pub recipient_id: i64,
}

impl<'a> OutboundFrame<'a> {
    pub fn message(message: &'a str, recipient_id: i64) -> Self {
        Self {
            kind: "message",
            message,
            recipient_id,
        }
    }
}

/// What a record is normalized against.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Active room; frames for other rooms are dropped.
    pub room_name: Option<&'a str>,
    pub conversation_id: &'a str,
    /// Locally stored id of the logged-in user.
    pub current_user_id: Option<&'a str>,
}

/// Parse a socket text frame.
pub fn parse_frame(text: &str) -> serde_json::Result<WireMessage> {
    serde_json::from_str(text)
}

/// Normalize an inbound socket frame. Returns `None` for frames that are not chat
/// messages or that belong to another room.
pub fn normalize_frame(frame: WireMessage, ctx: &NormalizeContext<'_>) -> Option<ChatMessage> {
    let kind = frame.kind.as_deref()?;
    if !MESSAGE_KINDS.contains(&kind) {
        tracing::debug!("Ignoring socket frame of type {}", kind);
        return None;
    }

    // Frames without a room are accepted.
    if let (Some(frame_room), Some(active)) = (frame.room_name.as_deref(), ctx.room_name) {
        if frame_room != active {
            tracing::debug!("Dropping frame for room {} (active {})", frame_room, active);
            return None;
        }
    }

    Some(normalize_record(frame, ctx))
}

/// Normalize a record from either transport into a `ChatMessage`.
pub fn normalize_record(record: WireMessage, ctx: &NormalizeContext<'_>) -> ChatMessage {
    let created_by = record.created_by.map(|id| id.to_string());
    let sender_id = record.sender_id.map(|id| id.to_string());

    let is_own = match ctx.current_user_id.map(str::trim).filter(|u| !u.is_empty()) {
        Some(me) => created_by.as_deref() == Some(me) || sender_id.as_deref() == Some(me),
        None => false,
    };

    let (text, attachment) = match record.attachment.and_then(WireAttachment::into_attachment) {
        Some(att) => (None, Some(att)),
        None => (Some(record.message.unwrap_or_default()), None),
    };

    ChatMessage {
        id: record
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("local-{}", uuid::Uuid::new_v4())),
        conversation_id: ctx.conversation_id.to_string(),
        sender_id: created_by.or(sender_id).unwrap_or_default(),
        text,
        attachment,
        timestamp: record
            .sent_time
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        is_own,
        status: None,
    }
}
