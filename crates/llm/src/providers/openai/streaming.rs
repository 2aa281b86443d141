//! [`ToolAwareLlmProvider`] trait implementation for the OpenAI streaming API.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use acacia_tool_runtime::{
    ChatTurn, LlmError, ProviderStream, ToolAwareLlmProvider, ToolDefinition,
};

use super::sse::ChunkTranslator;
use super::translate::{tool_definition_to_openai, turn_to_openai};
use crate::transport::{open_stream, translate_frames};

/// OpenAI provider bound to one API key.
pub struct OpenAiToolProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiToolProvider {
    /// Create a new OpenAI tool provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `base_url` - API base URL (e.g. `"https://api.openai.com"`)
    pub fn new(api_key: String, base_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_key, base_url)
    }

    pub fn with_client(client: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(super) fn request_body(turns: &[ChatTurn], tools: &[ToolDefinition], model: &str) -> Value {
        let api_messages: Vec<Value> = turns.iter().map(turn_to_openai).collect();
        let api_tools: Vec<Value> = tools.iter().map(tool_definition_to_openai).collect();

        let mut body = json!({
            "model": model,
            "messages": api_messages,
            "stream": true,
        });
        if !api_tools.is_empty() {
            body["tools"] = json!(api_tools);
        }
        body
    }
}

#[async_trait]
impl ToolAwareLlmProvider for OpenAiToolProvider {
    async fn stream_round(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<ProviderStream, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::request_body(turns, tools, model);

        debug!(model, url = %url, turns = turns.len(), "starting OpenAI streaming request");

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body);

        let frames = open_stream(request).await?;
        Ok(translate_frames(frames, ChunkTranslator::default()))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
