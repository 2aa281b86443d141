use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// A chat message in the provider-agnostic shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: '{other}'")),
        }
    }
}

/// One incremental unit of a streamed reply.
///
/// A stream carries any number of content chunks followed by exactly one
/// terminal chunk (`done == true`). Only the terminal chunk may carry an
/// error. Build chunks through the constructors so that invariant holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
    pub error: Option<ChatError>,
}

impl StreamChunk {
    /// A non-terminal chunk carrying one content increment.
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            done: false,
            error: None,
        }
    }

    /// Successful end of stream.
    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
            error: None,
        }
    }

    /// Terminal chunk carrying the error that ended the stream.
    pub fn failed(error: ChatError) -> Self {
        Self {
            content: String::new(),
            done: true,
            error: Some(error),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }
}
