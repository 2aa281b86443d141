use serde::{Deserialize, Serialize};

/// Events a vendor transport yields during one round.
/// Provider-agnostic: translated from OpenAI/Anthropic formats in the provider layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    /// A chunk of assistant text
    Content(String),
    /// A fragment of a tool call
    ToolCall(ToolCallDelta),
}

/// One fragment of a tool call, addressed by the vendor's integer position.
///
/// Fragments for different positions may interleave and may arrive in any
/// order; every field is optional and string fields are partial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }
}
