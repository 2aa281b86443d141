use std::time::Duration;

use thiserror::Error;

/// Every failure a reply can end with.
///
/// Errors detected before a stream opens are returned synchronously; once
/// streaming has started they travel inside the terminal [`StreamChunk`].
/// The enum is `Clone` so it can ride inside chunks.
///
/// [`StreamChunk`]: crate::message::StreamChunk
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(i64),

    #[error("no API key configured for provider '{provider}'")]
    CredentialMissing { provider: String },

    #[error("provider not supported: {0}")]
    ProviderUnsupported(String),

    #[error("invalid API key")]
    InvalidCredential,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("failed to parse arguments for tool '{tool}': {message}")]
    ToolArgumentParse { tool: String, message: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("failed to save assistant message: {0}")]
    AssistantNotSaved(String),

    #[error("failed to decrypt API key: {0}")]
    Decryption(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("tool-calling round limit ({0}) exceeded")]
    RoundLimitExceeded(usize),

    #[error("provider round timed out after {0:?}")]
    RoundTimeout(Duration),

    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing config value: {0}")]
    Missing(String),

    #[error("invalid config value: {0}")]
    Invalid(String),
}
