//! Persistence collaborator consumed by the conversation service.

use async_trait::async_trait;

use acacia_core::{
    ChatError, Conversation, NewConversation, NewMessage, StoredMessage, TeamCredential,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation {0} does not exist")]
    ConversationMissing(i64),
    #[error("credential {0} does not exist")]
    CredentialMissing(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConversationMissing(id) => ChatError::ConversationNotFound(id),
            other => ChatError::Persistence(other.to_string()),
        }
    }
}

/// Conversations, their ordered messages and team credentials.
///
/// Implementations must tolerate concurrent use from many replies.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, new: NewConversation) -> Result<Conversation, StoreError>;

    async fn get_conversation_by_id(&self, id: i64) -> Result<Option<Conversation>, StoreError>;

    /// Append a message, assigning the next sequence number of its conversation.
    async fn create_message(&self, new: NewMessage) -> Result<StoredMessage, StoreError>;

    /// All messages of a conversation in ascending sequence order.
    async fn get_messages_by_conversation_id(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    async fn get_credential_for_provider_and_team(
        &self,
        team_id: i64,
        provider: &str,
    ) -> Result<Option<TeamCredential>, StoreError>;

    async fn update_credential_last_used(&self, credential_id: i64) -> Result<(), StoreError>;
}
