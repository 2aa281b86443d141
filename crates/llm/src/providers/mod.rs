//! Vendor transports and the registry that hands out credential-bound
//! streaming adapters.

pub mod anthropic;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use acacia_core::config::{LlmConfig, OrchestrationConfig};
use acacia_core::ChatError;
use acacia_tool_runtime::{AgenticLoop, ChatStreamer, LoopSettings, ToolAwareLlmProvider, ToolRegistry};

pub use anthropic::AnthropicToolProvider;
pub use openai::OpenAiToolProvider;

/// Builds a vendor transport bound to one decrypted API key.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, credential: &str) -> Arc<dyn ToolAwareLlmProvider>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&str) -> Arc<dyn ToolAwareLlmProvider> + Send + Sync,
{
    fn create(&self, credential: &str) -> Arc<dyn ToolAwareLlmProvider> {
        self(credential)
    }
}

/// Maps provider names to factories.
///
/// Every adapter it returns shares the same tool registry and loop settings;
/// one adapter serves one streaming call.
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
    tools: Arc<ToolRegistry>,
    settings: LoopSettings,
}

impl ProviderRegistry {
    /// An empty registry; use [`register`](Self::register) to add vendors.
    pub fn new(tools: Arc<ToolRegistry>, settings: LoopSettings) -> Self {
        Self {
            factories: HashMap::new(),
            tools,
            settings,
        }
    }

    /// Registry with the `openai` and `anthropic` transports.
    pub fn from_config(
        llm: &LlmConfig,
        orchestration: &OrchestrationConfig,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let mut registry = Self::new(tools, LoopSettings::from(orchestration));
        // One connection pool for every adapter.
        let client = reqwest::Client::new();

        let openai_base = llm.openai_base_url.clone();
        let openai_client = client.clone();
        registry.register("openai", move |key: &str| -> Arc<dyn ToolAwareLlmProvider> {
            Arc::new(OpenAiToolProvider::with_client(
                openai_client.clone(),
                key.to_string(),
                openai_base.clone(),
            ))
        });

        let anthropic_base = llm.anthropic_base_url.clone();
        let max_tokens = llm.anthropic_max_tokens;
        registry.register("anthropic", move |key: &str| -> Arc<dyn ToolAwareLlmProvider> {
            Arc::new(AnthropicToolProvider::with_client(
                client.clone(),
                key.to_string(),
                anthropic_base.clone(),
                max_tokens,
            ))
        });

        registry
    }

    /// Register (or replace) a factory under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: impl ProviderFactory + 'static) {
        let name = name.into();
        if self.factories.contains_key(&name) {
            warn!(provider = %name, "replacing registered provider factory");
        }
        self.factories.insert(name, Arc::new(factory));
    }

    /// Build a streaming adapter for `name` bound to `credential`.
    pub fn get_provider(
        &self,
        name: &str,
        credential: &str,
    ) -> Result<Box<dyn ChatStreamer>, ChatError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ChatError::ProviderUnsupported(name.to_string()))?;

        debug!(provider = name, "creating streaming adapter");
        let transport = factory.create(credential);
        Ok(Box::new(
            AgenticLoop::new(transport, Arc::clone(&self.tools)).with_settings(self.settings.clone()),
        ))
    }

    /// Registered provider names, sorted.
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acacia_core::{Message, RequestContext};
    use acacia_tool_runtime::provider::mock::MockLlmProvider;

    fn registry_with_mock(mock: &MockLlmProvider) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new(Arc::new(ToolRegistry::new()), LoopSettings::default());
        let mock = mock.clone();
        registry.register("mock", move |_key: &str| -> Arc<dyn ToolAwareLlmProvider> {
            Arc::new(mock.clone())
        });
        registry
    }

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let registry = registry_with_mock(&MockLlmProvider::new());
        let err = registry.get_provider("gemini", "key").err().unwrap();
        assert_eq!(err, ChatError::ProviderUnsupported("gemini".into()));
    }

    #[test]
    fn test_from_config_registers_vendors() {
        let registry = ProviderRegistry::from_config(
            &LlmConfig {
                openai_base_url: "http://localhost:1".into(),
                anthropic_base_url: "http://localhost:2".into(),
                anthropic_max_tokens: 256,
            },
            &OrchestrationConfig::default(),
            Arc::new(ToolRegistry::new()),
        );
        assert_eq!(registry.provider_names(), vec!["anthropic", "openai"]);
        assert_eq!(registry.get_provider("openai", "k").unwrap().provider_name(), "openai");
        assert_eq!(
            registry.get_provider("anthropic", "k").unwrap().provider_name(),
            "anthropic"
        );
    }

    #[test]
    fn test_factory_receives_credential() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = ProviderRegistry::new(Arc::new(ToolRegistry::new()), LoopSettings::default());
        let seen_by_factory = Arc::clone(&seen);
        registry.register("mock", move |key: &str| -> Arc<dyn ToolAwareLlmProvider> {
            seen_by_factory.lock().unwrap().push(key.to_string());
            Arc::new(MockLlmProvider::new())
        });

        registry.get_provider("mock", "sk-team-1").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["sk-team-1".to_string()]);
    }

    #[tokio::test]
    async fn test_adapter_streams_through_agentic_loop() {
        let mock = MockLlmProvider::new();
        mock.queue_text(&["hi ", "there"]);
        let registry = registry_with_mock(&mock);

        let adapter = registry.get_provider("mock", "key").unwrap();
        let mut rx = adapter.stream_with_tools(
            vec![Message::user("hello")],
            "m".into(),
            RequestContext::anonymous(),
        );

        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            text.push_str(&chunk.content);
            if chunk.done {
                assert!(chunk.error.is_none());
            }
        }
        assert_eq!(text, "hi there");
    }
}
