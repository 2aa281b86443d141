use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use acacia_core::RequestContext;

/// Describes a tool's interface for LLM consumption.
/// Maps to OpenAI's function format and Anthropic's tool format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "calculate", "search_issues")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected input
    pub input_schema: Value,
}

/// A model-requested invocation, exactly as the vendor sent it.
///
/// `arguments` stays the raw JSON text so the assistant turn can be replayed
/// byte-for-byte in the next round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-assigned ID, used to match results
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// Raw JSON argument text
    pub arguments: String,
}

/// Result of executing a tool, sent back to the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Must match the ToolCall id
    pub tool_call_id: String,
    /// Canonical text form of the tool output
    pub content: String,
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async. `execute` receives the
/// request context of the conversation that triggered it; tools touching
/// user data must check the caller's access themselves.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema).
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with parsed JSON arguments.
    async fn execute(
        &self,
        args: Map<String, Value>,
        context: &RequestContext,
    ) -> Result<Value, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Render tool output as the text sent back to the model.
/// Strings pass through untouched; everything else becomes compact JSON.
pub fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}
