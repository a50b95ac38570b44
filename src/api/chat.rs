//! Chat REST endpoints and the chat CLI commands
//!
//! Contacts come from `list_chat_companies/` (students) or `list_chat_students/`
//! (companies); history and the REST send path go through `list_messages/` and
//! `send_message/`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::client::PortalClient;
use super::error::ApiError;
use crate::auth::{Role, Session};
use crate::chat::wire::{normalize_record, NormalizeContext, WireId, WireMessage};
use crate::chat::{send_text, ChatBackend, ConversationLoader, RoomChannel, SendPath};
use crate::models::{ChatContact, ChatMessage};

/// How long the CLI waits for the room socket before sending over REST.
const SOCKET_CONNECT_WAIT: Duration = Duration::from_secs(3);

/// Contact row. Student and company listings name their fields differently.
#[derive(Debug, Default, Deserialize)]
struct ContactRecord {
    id: Option<WireId>,
    company_id: Option<WireId>,
    student_id: Option<WireId>,
    user_id: Option<WireId>,
    name: Option<String>,
    company_name: Option<String>,
    student_name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    designation: Option<String>,
    industry: Option<String>,
    last_message: Option<String>,
    last_message_time: Option<String>,
    image: Option<String>,
    logo: Option<String>,
    profile_image: Option<String>,
    unread_count: Option<u32>,
    room_name: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ContactRecord {
    fn into_contact(self) -> Option<ChatContact> {
        let id = self
            .id
            .or(self.company_id)
            .or(self.student_id)
            .or(self.user_id)?
            .to_string();
        if id.is_empty() {
            return None;
        }

        let full_name = match (non_empty(self.first_name), non_empty(self.last_name)) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (first, last) => first.or(last),
        };
        let name = non_empty(self.name)
            .or(non_empty(self.company_name))
            .or(non_empty(self.student_name))
            .or(full_name)
            .or(non_empty(self.email.clone()))
            .unwrap_or_else(|| format!("Contact {}", id));

        let subtitle = non_empty(self.last_message)
            .or(non_empty(self.designation))
            .or(non_empty(self.industry))
            .or(non_empty(self.email));

        Some(ChatContact {
            id,
            name,
            subtitle,
            last_message_at: non_empty(self.last_message_time),
            avatar: non_empty(self.profile_image)
                .or(non_empty(self.image))
                .or(non_empty(self.logo)),
            unread: self.unread_count.filter(|&n| n > 0),
            room_name: non_empty(self.room_name),
        })
    }
}

/// Contact-list endpoint for a role. Only students and companies chat.
fn contacts_path(role: Role) -> Result<&'static str, ApiError> {
    match role {
        Role::Student => Ok("list_chat_companies/"),
        Role::Company => Ok("list_chat_students/"),
        other => Err(ApiError::Forbidden(format!(
            "Chat is not available for {} accounts",
            other.as_str()
        ))),
    }
}

fn parse_contacts(records: Vec<ContactRecord>) -> Vec<ChatContact> {
    records
        .into_iter()
        .filter_map(ContactRecord::into_contact)
        .collect()
}

fn recipient_value(contact: &ChatContact) -> serde_json::Value {
    match contact.recipient_id() {
        Some(id) => serde_json::Value::from(id),
        None => serde_json::Value::from(contact.id.clone()),
    }
}

impl ChatBackend for PortalClient {
    async fn list_contacts(&self, role: Role) -> Result<Vec<ChatContact>, ApiError> {
        let path = contacts_path(role)?;
        let env = self.get::<Vec<ContactRecord>>(path, &[]).await?;
        Ok(parse_contacts(env.data.unwrap_or_default()))
    }

    async fn list_messages(
        &self,
        contact: &ChatContact,
        current_user_id: Option<&str>,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let path = format!("list_messages/{}/", contact.id);
        let env = self.get::<Vec<WireMessage>>(&path, &[]).await?;
        let key = contact.conversation_key();
        let ctx = NormalizeContext {
            room_name: contact.room_name.as_deref(),
            conversation_id: &key,
            current_user_id,
        };
        Ok(env
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|record| normalize_record(record, &ctx))
            .collect())
    }

    async fn send_message(
        &self,
        contact: &ChatContact,
        text: &str,
        current_user_id: Option<&str>,
    ) -> Result<Option<ChatMessage>, ApiError> {
        let body = serde_json::json!({
            "recipient_id": recipient_value(contact),
            "message": text,
        });
        let env = self.post::<WireMessage>("send_message/", &body).await?;
        let key = contact.conversation_key();
        let ctx = NormalizeContext {
            room_name: contact.room_name.as_deref(),
            conversation_id: &key,
            current_user_id,
        };
        Ok(env.data.map(|record| {
            let mut message = normalize_record(record, &ctx);
            // The server does not always echo the sender.
            message.is_own = true;
            message
        }))
    }
}

// ---------------------------------------------------------------------------
// CLI commands
// ---------------------------------------------------------------------------

/// Logged-in client plus the stored session.
fn chat_session() -> Result<(PortalClient, Session)> {
    let client = PortalClient::authenticated()?;
    let session = client
        .session()
        .load()
        .context("Not logged in. Run 'portal-cli login' first.")?;
    Ok((client, session))
}

/// Load contacts and find `contact_id` among them.
async fn resolve_contact(
    client: &PortalClient,
    session: &Session,
    loader: &mut ConversationLoader,
    contact_id: &str,
) -> Result<ChatContact> {
    let cancel = CancellationToken::new();
    loader
        .refresh_contacts(client, session.role, &cancel)
        .await
        .context("Failed to load chat contacts")?;
    loader
        .find_contact(contact_id)
        .cloned()
        .with_context(|| format!("No chat contact with id {}", contact_id))
}

fn print_message(contact: &ChatContact, msg: &ChatMessage) {
    let sender = if msg.is_own { "you" } else { contact.name.as_str() };
    println!("[{}] {}: {}", msg.display_time(), sender, msg.preview());
}

/// List chat contacts (prints to stdout).
pub async fn list_contacts() -> Result<()> {
    let (client, session) = chat_session()?;
    let contacts = client
        .list_contacts(session.role)
        .await
        .context("Failed to load chat contacts")?;

    println!("\nChat Contacts:");
    println!("{:-<60}", "");

    if contacts.is_empty() {
        println!("  (no contacts)");
        return Ok(());
    }

    for contact in &contacts {
        match contact.unread {
            Some(n) => println!("{} ({} unread)", contact.name, n),
            None => println!("{}", contact.name),
        }
        println!("  ID: {}", contact.id);
        if let Some(ref subtitle) = contact.subtitle {
            println!("  {}", subtitle);
        }
        if let Some(ref at) = contact.last_message_at {
            println!("  Last: {}", crate::models::format_timestamp(at));
        }
        println!();
    }

    Ok(())
}

/// Print the last `limit` messages exchanged with a contact.
pub async fn read_messages(contact_id: &str, limit: usize) -> Result<()> {
    let (client, session) = chat_session()?;
    let mut loader = ConversationLoader::new(session.user_id.clone());
    let contact = resolve_contact(&client, &session, &mut loader, contact_id).await?;

    let history = loader
        .open(&client, &contact, &CancellationToken::new())
        .await
        .context("Failed to load messages")?;

    if history.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let skip = history.len().saturating_sub(limit);
    for msg in &history[skip..] {
        print_message(&contact, msg);
    }

    Ok(())
}

/// Send a message, over the room socket when it opens in time, else over REST.
pub async fn send_message(to: &str, message: &str) -> Result<()> {
    let (client, session) = chat_session()?;
    let mut loader = ConversationLoader::new(session.user_id.clone());
    let contact = resolve_contact(&client, &session, &mut loader, to).await?;

    let mut channel = RoomChannel::new(
        client.base_url(),
        Some(session.token.clone()),
        session.user_id.clone(),
        Arc::new(|_: ChatMessage| {}),
    );
    channel.set_room(contact.room_name.clone(), &contact.conversation_key())?;
    if contact.room_name.is_some() && !channel.wait_connected(SOCKET_CONNECT_WAIT).await {
        tracing::debug!("Room socket did not open in time; sending over REST");
    }

    let path = send_text(Some(&channel), &client, &mut loader, &contact, message)
        .await
        .context("Failed to send message")?;

    // Give the writer task a moment to flush the frame before the socket closes.
    if path == SendPath::Socket {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    channel.close();

    println!("Message sent.");
    Ok(())
}

/// Stream incoming messages for a contact until Ctrl-C.
pub async fn listen(contact_id: &str) -> Result<()> {
    let (client, session) = chat_session()?;
    let mut loader = ConversationLoader::new(session.user_id.clone());
    let contact = resolve_contact(&client, &session, &mut loader, contact_id).await?;

    let Some(room) = contact.room_name.clone() else {
        anyhow::bail!("{} has no chat room yet; send a message first", contact.name);
    };

    let printed = contact.clone();
    let mut channel = RoomChannel::new(
        client.base_url(),
        Some(session.token.clone()),
        session.user_id.clone(),
        Arc::new(move |msg: ChatMessage| print_message(&printed, &msg)),
    );
    channel.set_room(Some(room.clone()), &contact.conversation_key())?;

    if channel.wait_connected(SOCKET_CONNECT_WAIT).await {
        println!("Listening on {} (Ctrl-C to stop)", room);
    } else {
        println!("Connecting to {} (Ctrl-C to stop)", room);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;
    channel.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Envelope;

    #[test]
    fn test_company_listing_for_students() {
        let env: Envelope<Vec<ContactRecord>> = serde_json::from_str(
            r#"{"statusCode":200,"data":[
                {"company_id":12,"company_name":"Acme Labs","industry":"Robotics","room_name":"room_9_12","unread_count":3},
                {"id":"13","name":"  ","email":"hr@globex.test"}
            ]}"#,
        )
        .unwrap();
        let contacts = parse_contacts(env.data.unwrap());

        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].id, "12");
        assert_eq!(contacts[0].name, "Acme Labs");
        assert_eq!(contacts[0].subtitle.as_deref(), Some("Robotics"));
        assert_eq!(contacts[0].unread, Some(3));
        assert_eq!(contacts[0].room_name.as_deref(), Some("room_9_12"));
        assert_eq!(contacts[1].name, "hr@globex.test");
    }

    #[test]
    fn test_student_listing_uses_full_name() {
        let records: Vec<ContactRecord> = serde_json::from_str(
            r#"[{"student_id":4,"first_name":"Asha","last_name":"Rao","unread_count":0},{"name":"no id"}]"#,
        )
        .unwrap();
        let contacts = parse_contacts(records);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Asha Rao");
        assert_eq!(contacts[0].unread, None);
    }

    #[test]
    fn test_only_students_and_companies_chat() {
        assert_eq!(contacts_path(Role::Student).unwrap(), "list_chat_companies/");
        assert_eq!(contacts_path(Role::Company).unwrap(), "list_chat_students/");
        assert!(matches!(
            contacts_path(Role::Superadmin),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_recipient_value_prefers_number() {
        let mut contact = ChatContact {
            id: "12".to_string(),
            name: "Acme".to_string(),
            subtitle: None,
            last_message_at: None,
            avatar: None,
            unread: None,
            room_name: None,
        };
        assert_eq!(recipient_value(&contact), serde_json::json!(12));
        contact.id = "acme".to_string();
        assert_eq!(recipient_value(&contact), serde_json::json!("acme"));
    }
}
