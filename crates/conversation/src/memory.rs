//! In-process [`ConversationStore`].

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use acacia_core::{Conversation, NewConversation, NewMessage, StoredMessage, TeamCredential};

use crate::store::{ConversationStore, StoreError};

#[derive(Default)]
struct Tables {
    conversations: HashMap<i64, Conversation>,
    messages: HashMap<i64, Vec<StoredMessage>>,
    credentials: Vec<TeamCredential>,
    next_conversation_id: i64,
    next_message_id: i64,
    next_credential_id: i64,
}

/// Keeps everything in memory behind one lock. Used by the CLI and tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an already-encrypted API key for a team.
    pub fn insert_credential(
        &self,
        team_id: i64,
        provider: impl Into<String>,
        encrypted_key: impl Into<String>,
    ) -> TeamCredential {
        let mut tables = self.write();
        tables.next_credential_id += 1;
        let credential = TeamCredential {
            id: tables.next_credential_id,
            team_id,
            provider: provider.into(),
            encrypted_key: encrypted_key.into(),
            last_used_at: None,
        };
        tables.credentials.push(credential.clone());
        credential
    }

    pub fn credential(&self, credential_id: i64) -> Option<TeamCredential> {
        self.read()
            .credentials
            .iter()
            .find(|c| c.id == credential_id)
            .cloned()
    }

    // A poisoned lock only means another reply panicked mid-write; the tables
    // themselves are still consistent row by row.
    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(&self, new: NewConversation) -> Result<Conversation, StoreError> {
        let mut tables = self.write();
        tables.next_conversation_id += 1;
        let now = Utc::now();
        let conversation = Conversation {
            id: tables.next_conversation_id,
            user_id: new.user_id,
            team_id: new.team_id,
            provider: new.provider,
            model: new.model,
            title: new.title,
            created_at: now,
            updated_at: now,
        };
        tables.conversations.insert(conversation.id, conversation.clone());
        tables.messages.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn get_conversation_by_id(&self, id: i64) -> Result<Option<Conversation>, StoreError> {
        Ok(self.read().conversations.get(&id).cloned())
    }

    async fn create_message(&self, new: NewMessage) -> Result<StoredMessage, StoreError> {
        let mut tables = self.write();
        if !tables.conversations.contains_key(&new.conversation_id) {
            return Err(StoreError::ConversationMissing(new.conversation_id));
        }
        tables.next_message_id += 1;
        let id = tables.next_message_id;
        let now = Utc::now();

        let thread = tables.messages.entry(new.conversation_id).or_default();
        let sequence_number = thread.last().map_or(1, |m| m.sequence_number + 1);
        let message = StoredMessage {
            id,
            conversation_id: new.conversation_id,
            role: new.role,
            content: new.content,
            sequence_number,
            created_at: now,
        };
        thread.push(message.clone());

        if let Some(conversation) = tables.conversations.get_mut(&new.conversation_id) {
            conversation.updated_at = now;
        }
        Ok(message)
    }

    async fn get_messages_by_conversation_id(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self
            .read()
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_credential_for_provider_and_team(
        &self,
        team_id: i64,
        provider: &str,
    ) -> Result<Option<TeamCredential>, StoreError> {
        Ok(self
            .read()
            .credentials
            .iter()
            .find(|c| c.team_id == team_id && c.provider == provider)
            .cloned())
    }

    async fn update_credential_last_used(&self, credential_id: i64) -> Result<(), StoreError> {
        let mut tables = self.write();
        let credential = tables
            .credentials
            .iter_mut()
            .find(|c| c.id == credential_id)
            .ok_or(StoreError::CredentialMissing(credential_id))?;
        credential.last_used_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acacia_core::Role;

    async fn conversation(store: &InMemoryStore) -> Conversation {
        store
            .create_conversation(NewConversation {
                user_id: 1,
                team_id: 10,
                provider: "openai".into(),
                model: "gpt-4o".into(),
                title: "t".into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sequence_numbers_are_per_conversation() {
        let store = InMemoryStore::new();
        let a = conversation(&store).await;
        let b = conversation(&store).await;

        let a1 = store.create_message(NewMessage::new(a.id, Role::User, "a1")).await.unwrap();
        let b1 = store.create_message(NewMessage::new(b.id, Role::User, "b1")).await.unwrap();
        let a2 = store.create_message(NewMessage::new(a.id, Role::Assistant, "a2")).await.unwrap();

        assert_eq!((a1.sequence_number, a2.sequence_number), (1, 2));
        assert_eq!(b1.sequence_number, 1);

        let history = store.get_messages_by_conversation_id(a.id).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_message_for_missing_conversation() {
        let store = InMemoryStore::new();
        let err = store
            .create_message(NewMessage::new(42, Role::User, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationMissing(42)));
    }

    #[tokio::test]
    async fn test_credential_lookup_is_exact() {
        let store = InMemoryStore::new();
        store.insert_credential(10, "openai", "enc-openai");

        assert!(store
            .get_credential_for_provider_and_team(10, "anthropic")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_credential_for_provider_and_team(11, "openai")
            .await
            .unwrap()
            .is_none());
        let found = store
            .get_credential_for_provider_and_team(10, "openai")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.encrypted_key, "enc-openai");
    }

    #[tokio::test]
    async fn test_update_last_used() {
        let store = InMemoryStore::new();
        let cred = store.insert_credential(10, "openai", "enc");
        assert!(cred.last_used_at.is_none());

        store.update_credential_last_used(cred.id).await.unwrap();
        assert!(store.credential(cred.id).unwrap().last_used_at.is_some());

        assert!(matches!(
            store.update_credential_last_used(999).await,
            Err(StoreError::CredentialMissing(999))
        ));
    }
}
