use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// A chat thread owned by one user and billed to one team's credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub team_id: i64,
    /// Provider registry key, e.g. "openai".
    pub provider: String,
    pub model: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConversation {
    pub user_id: i64,
    pub team_id: i64,
    pub provider: String,
    pub model: String,
    pub title: String,
}

/// A persisted message. `sequence_number` is assigned by the store and is
/// strictly increasing within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub sequence_number: i32,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    pub fn new(conversation_id: i64, role: Role, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role,
            content: content.into(),
        }
    }
}

/// A team's vendor API key, encrypted at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCredential {
    pub id: i64,
    pub team_id: i64,
    pub provider: String,
    pub encrypted_key: String,
    pub last_used_at: Option<DateTime<Utc>>,
}
