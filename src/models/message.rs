//! Chat message model

use serde::{Deserialize, Serialize};

/// Delivery state of a locally originated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Failed,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    /// MIME-ish kind reported by the server, `"file"` when unknown.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
}

impl Attachment {
    /// Display name: explicit name, else the last path segment of the URL.
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        self.url
            .split('?')
            .next()
            .and_then(|path| path.rsplit('/').find(|seg| !seg.is_empty()))
            .unwrap_or(&self.url)
            .to_string()
    }
}

/// A message in a conversation. Exactly one of `text` and `attachment` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
    pub timestamp: String,
    pub is_own: bool,
    pub status: Option<MessageStatus>,
}

impl ChatMessage {
    /// Single-line preview for lists and logs.
    pub fn preview(&self) -> String {
        match (&self.text, &self.attachment) {
            (Some(text), _) => text.clone(),
            (None, Some(att)) => format!("[file] {}", att.display_name()),
            (None, None) => String::new(),
        }
    }

    /// Timestamp in local time, or the raw string when it is not RFC 3339.
    pub fn display_time(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// Render an RFC 3339 timestamp as `YYYY-MM-DD HH:MM` in local time.
pub fn format_timestamp(raw: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => dt
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}
