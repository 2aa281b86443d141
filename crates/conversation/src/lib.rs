//! Conversation-level orchestration on top of the provider registry:
//! persistence, credential decryption and reply relaying.

pub mod crypto;
pub mod memory;
pub mod service;
pub mod sse;
pub mod store;

pub use crypto::{CryptoError, Decrypter, EncryptionService};
pub use memory::InMemoryStore;
pub use service::{ConversationService, ReplyOutcome, ReplyStream};
pub use sse::SseEvent;
pub use store::{ConversationStore, StoreError};
