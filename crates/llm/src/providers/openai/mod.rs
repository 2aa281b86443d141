//! OpenAI Chat Completions implementation of [`ToolAwareLlmProvider`].
//!
//! Streams `/v1/chat/completions` with `stream: true`, translating between the
//! Chat Completions wire format and the provider-agnostic [`ProviderEvent`] /
//! [`ChatTurn`] types.
//!
//! [`ToolAwareLlmProvider`]: acacia_tool_runtime::ToolAwareLlmProvider
//! [`ProviderEvent`]: acacia_tool_runtime::ProviderEvent
//! [`ChatTurn`]: acacia_tool_runtime::ChatTurn

mod sse;
mod streaming;
mod translate;

pub use self::streaming::OpenAiToolProvider;
