//! [`ToolAwareLlmProvider`] trait implementation for the Anthropic streaming API.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use acacia_tool_runtime::{
    ChatTurn, LlmError, ProviderStream, ToolAwareLlmProvider, ToolDefinition,
};

use super::sse::EventTranslator;
use super::translate::{tool_definition_to_anthropic, turns_to_anthropic};
use crate::transport::{open_stream, translate_frames};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider with streaming tool-use support, bound to one API key.
///
/// Uses the Messages API (`/v1/messages`) with `stream: true`.
pub struct AnthropicToolProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicToolProvider {
    /// Create a new Anthropic tool provider.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `base_url` - API base URL (e.g. `"https://api.anthropic.com"`)
    /// * `max_tokens` - output budget sent with every request
    pub fn new(api_key: String, base_url: String, max_tokens: u32) -> Self {
        Self::with_client(reqwest::Client::new(), api_key, base_url, max_tokens)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
        }
    }

    pub(super) fn request_body(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Value {
        let history = turns_to_anthropic(turns);
        let api_tools: Vec<Value> = tools.iter().map(tool_definition_to_anthropic).collect();

        let mut body = json!({
            "model": model,
            "messages": history.messages,
            "max_tokens": self.max_tokens,
            "stream": true,
        });
        if !api_tools.is_empty() {
            body["tools"] = json!(api_tools);
        }
        if let Some(system) = history.system {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl ToolAwareLlmProvider for AnthropicToolProvider {
    async fn stream_round(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<ProviderStream, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(turns, tools, model);

        debug!(model, url = %url, turns = turns.len(), "starting Anthropic streaming request");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body);

        let frames = open_stream(request).await?;
        Ok(translate_frames(frames, EventTranslator::new()))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}
