use acacia_core::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// One entry of the history sent to a vendor within a single reply.
///
/// Stored conversations only ever hold text turns; the tool-call and
/// tool-result variants exist only while the agentic loop runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatTurn {
    System(String),
    User(String),
    Assistant {
        /// Text the model produced in the same round, if any
        text: Option<String>,
        /// Tool calls requested by the assistant, in accumulation order
        tool_calls: Vec<ToolCall>,
    },
    Tool(ToolResult),
}

impl ChatTurn {
    pub fn assistant_text(text: impl Into<String>) -> Self {
        ChatTurn::Assistant {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn from_messages(messages: &[Message]) -> Vec<ChatTurn> {
        messages.iter().map(ChatTurn::from).collect()
    }
}

impl From<&Message> for ChatTurn {
    fn from(msg: &Message) -> Self {
        match msg.role {
            Role::System => ChatTurn::System(msg.content.clone()),
            Role::User => ChatTurn::User(msg.content.clone()),
            Role::Assistant => ChatTurn::assistant_text(msg.content.clone()),
        }
    }
}
