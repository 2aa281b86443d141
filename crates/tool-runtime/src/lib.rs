//! Tool-calling orchestration: the tool capability, the tool registry and the
//! agentic loop that drives a vendor transport through tool rounds.

pub mod accumulator;
pub mod history;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod stream;
pub mod tool;
pub mod tools;

pub use accumulator::{ToolCallAccumulator, ToolCallBuffer};
pub use history::ChatTurn;
pub use provider::{LlmError, ProviderStream, ToolAwareLlmProvider};
pub use registry::{RegistryError, ToolRegistry};
pub use runtime::{AgenticLoop, ChatStreamer, ChunkReceiver, LoopSettings};
pub use stream::{ProviderEvent, ToolCallDelta};
pub use tool::{render_output, Tool, ToolCall, ToolDefinition, ToolError, ToolResult};
pub use tools::{
    CalculateTool, GetIssueDetailsTool, GetProjectDetailsTool, GetUserProjectsTool, IssueDirectory,
    SearchIssuesTool,
};
