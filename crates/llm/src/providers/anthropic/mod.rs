//! Anthropic Messages API implementation of [`ToolAwareLlmProvider`].
//!
//! Supports streaming tool use via SSE, translating between the Messages API
//! format and the provider-agnostic [`ProviderEvent`] / [`ChatTurn`] types.
//!
//! [`ToolAwareLlmProvider`]: acacia_tool_runtime::ToolAwareLlmProvider
//! [`ProviderEvent`]: acacia_tool_runtime::ProviderEvent
//! [`ChatTurn`]: acacia_tool_runtime::ChatTurn

mod sse;
mod streaming;
mod translate;

pub use self::streaming::AnthropicToolProvider;
