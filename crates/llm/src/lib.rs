//! Vendor transports (OpenAI, Anthropic) for the agentic loop, plus the
//! provider registry that binds them to team credentials.

pub mod providers;
pub mod sse;
mod transport;

pub use providers::{AnthropicToolProvider, OpenAiToolProvider, ProviderFactory, ProviderRegistry};
pub use sse::{SseDecoder, SseFrame};
