//! Contact list and per-contact conversation history

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;

use super::ChatBackend;
use crate::api::{with_cancel, ApiError};
use crate::auth::Role;
use crate::models::{ChatContact, ChatMessage};

/// Holds the contact list and the conversations opened so far.
///
/// History is fetched once per conversation; after that the thread only grows
/// by appends (socket deliveries and REST fallback sends).
#[derive(Default)]
pub struct ConversationLoader {
    contacts: Vec<ChatContact>,
    conversations: HashMap<String, Vec<ChatMessage>>,
    /// Conversations whose history has been installed. Appends alone do not count.
    loaded: HashSet<String>,
    current_user_id: Option<String>,
}

impl ConversationLoader {
    pub fn new(current_user_id: Option<String>) -> Self {
        Self {
            current_user_id,
            ..Self::default()
        }
    }

    pub fn current_user_id(&self) -> Option<&str> {
        self.current_user_id.as_deref()
    }

    pub fn contacts(&self) -> &[ChatContact] {
        &self.contacts
    }

    pub fn find_contact(&self, id: &str) -> Option<&ChatContact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    /// Replace the contact list wholesale.
    pub fn set_contacts(&mut self, contacts: Vec<ChatContact>) {
        self.contacts = contacts;
    }

    /// Fetch the contact list for `role`. A cancelled fetch leaves the list untouched.
    pub async fn refresh_contacts<B: ChatBackend>(
        &mut self,
        backend: &B,
        role: Role,
        cancel: &CancellationToken,
    ) -> Result<&[ChatContact], ApiError> {
        let contacts = with_cancel(cancel, backend.list_contacts(role)).await?;
        tracing::debug!("Loaded {} chat contacts", contacts.len());
        self.set_contacts(contacts);
        Ok(&self.contacts)
    }

    pub fn is_loaded(&self, contact: &ChatContact) -> bool {
        self.loaded.contains(&contact.conversation_key())
    }

    /// Messages of a conversation, oldest first.
    pub fn messages(&self, conversation_id: &str) -> &[ChatMessage] {
        self.conversations
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Load history for `contact` unless it is already cached.
    pub async fn open<B: ChatBackend>(
        &mut self,
        backend: &B,
        contact: &ChatContact,
        cancel: &CancellationToken,
    ) -> Result<&[ChatMessage], ApiError> {
        let key = contact.conversation_key();
        if !self.loaded.contains(&key) {
            let history = with_cancel(
                cancel,
                backend.list_messages(contact, self.current_user_id.as_deref()),
            )
            .await?;
            tracing::debug!("Loaded {} messages for {}", history.len(), key);
            self.set_history(&key, history);
        }
        Ok(self.messages(&key))
    }

    /// Install fetched history for a conversation. Messages that arrived on the
    /// socket before the history did are kept after it.
    pub fn set_history(&mut self, conversation_id: &str, history: Vec<ChatMessage>) {
        let early = self.conversations.remove(conversation_id).unwrap_or_default();
        let mut thread = history;
        thread.extend(early);
        self.conversations.insert(conversation_id.to_string(), thread);
        self.loaded.insert(conversation_id.to_string());
    }

    /// Append a message to the end of its conversation.
    pub fn append(&mut self, message: ChatMessage) {
        self.conversations
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::{contact, message, MockChat};

    #[tokio::test]
    async fn test_history_is_fetched_once() {
        let backend = MockChat::with_history(vec![message("1", "room_1", "hello")]);
        let mut loader = ConversationLoader::new(Some("9".to_string()));
        let c = contact("4", Some("room_1"));
        let cancel = CancellationToken::new();

        assert_eq!(loader.open(&backend, &c, &cancel).await.unwrap().len(), 1);
        assert_eq!(loader.open(&backend, &c, &cancel).await.unwrap().len(), 1);
        assert_eq!(backend.history_calls(), 1);
        assert!(loader.is_loaded(&c));
    }

    #[tokio::test]
    async fn test_refresh_replaces_contacts() {
        let backend = MockChat::default();
        let mut loader = ConversationLoader::default();
        loader.set_contacts(vec![contact("old", None)]);

        let cancel = CancellationToken::new();
        let contacts = loader
            .refresh_contacts(&backend, Role::Student, &cancel)
            .await
            .unwrap();
        assert_eq!(contacts.len(), 2);
        assert!(loader.find_contact("old").is_none());
        assert!(loader.find_contact("4").is_some());
    }

    #[tokio::test]
    async fn test_cancelled_refresh_keeps_state() {
        let backend = MockChat::default();
        let mut loader = ConversationLoader::default();
        loader.set_contacts(vec![contact("old", None)]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = loader
            .refresh_contacts(&backend, Role::Student, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert!(loader.find_contact("old").is_some());
    }

    #[test]
    fn test_append_and_early_socket_messages() {
        let mut loader = ConversationLoader::default();
        loader.append(message("live", "room_1", "arrived first"));
        loader.set_history("room_1", vec![message("1", "room_1", "old")]);
        loader.append(message("2", "room_1", "newest"));

        let ids: Vec<&str> = loader.messages("room_1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "live", "2"]);
        assert!(loader.messages("unknown").is_empty());
    }

    #[tokio::test]
    async fn test_history_loads_after_earlier_append() {
        let backend = MockChat::with_history(vec![
            message("1", "5", "first"),
            message("2", "5", "second"),
        ]);
        let mut loader = ConversationLoader::new(Some("9".to_string()));
        let c = contact("5", None);
        let cancel = CancellationToken::new();

        // A REST send before the history ever arrived.
        loader.append(message("sent", "5", "hi"));
        assert!(!loader.is_loaded(&c));

        let ids: Vec<String> = loader
            .open(&backend, &c, &cancel)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(ids, vec!["1", "2", "sent"]);
        assert_eq!(backend.history_calls(), 1);
        assert!(loader.is_loaded(&c));

        loader.open(&backend, &c, &cancel).await.unwrap();
        assert_eq!(backend.history_calls(), 1);
    }
}
