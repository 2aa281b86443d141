use crate::history::ChatTurn;
use crate::stream::ProviderEvent;
use crate::tool::ToolDefinition;
use acacia_core::ChatError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Events of one vendor round, ending when the vendor finishes its response.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent, LlmError>> + Send>>;

/// Vendor transport for one request/response round with tools available.
///
/// This trait lives in tool-runtime (not in crates/llm) because it's
/// defined by the consumer (the agentic loop), not the provider.
/// Implementations live in crates/llm. An instance is bound to one credential.
#[async_trait]
pub trait ToolAwareLlmProvider: Send + Sync {
    /// Open one streaming round. The returned stream ends cleanly when the
    /// vendor signals completion.
    async fn stream_round(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<ProviderStream, LlmError>;

    /// Provider name for logging/debugging (e.g., "openai", "anthropic")
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("Authentication failed")]
    AuthError,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Map a non-success HTTP status to the matching error.
    pub fn from_status(status: u16, body: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            401 | 403 => LlmError::AuthError,
            429 => LlmError::RateLimited { retry_after_secs },
            _ => LlmError::ApiError {
                status,
                message: body,
            },
        }
    }
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::AuthError => ChatError::InvalidCredential,
            LlmError::RateLimited { .. } => ChatError::RateLimited,
            other => ChatError::Provider(other.to_string()),
        }
    }
}

/// Mock LLM provider for testing the agentic loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::stream::ToolCallDelta;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// One scripted step within a round.
    pub enum MockStep {
        Event(ProviderEvent),
        Error(LlmError),
        /// Sleep before the next step.
        Delay(Duration),
        /// Never yield again.
        Hang,
    }

    /// What the loop sent for one round.
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub turns: Vec<ChatTurn>,
        pub tools: Vec<ToolDefinition>,
        pub model: String,
    }

    enum MockRound {
        Steps(Vec<MockStep>),
        OpenError(LlmError),
    }

    /// A mock provider that replays scripted rounds in FIFO order.
    ///
    /// Clones share the same script and request log, so a test can keep a
    /// handle while a factory hands copies to the code under test.
    #[derive(Clone, Default)]
    pub struct MockLlmProvider {
        rounds: Arc<Mutex<VecDeque<MockRound>>>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl MockLlmProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a round that replays the given steps.
        pub fn queue_steps(&self, steps: Vec<MockStep>) {
            self.rounds.lock().unwrap().push_back(MockRound::Steps(steps));
        }

        /// Queue a round made of successful events only.
        pub fn queue_response(&self, events: Vec<ProviderEvent>) {
            self.queue_steps(events.into_iter().map(MockStep::Event).collect());
        }

        /// Queue a simple text response, one event per fragment.
        pub fn queue_text(&self, fragments: &[&str]) {
            self.queue_response(
                fragments
                    .iter()
                    .map(|f| ProviderEvent::Content(f.to_string()))
                    .collect(),
            );
        }

        /// Queue a round that requests a single tool call.
        pub fn queue_tool_call(&self, id: &str, name: &str, arguments: &str) {
            self.queue_response(vec![ProviderEvent::ToolCall(
                ToolCallDelta::new(0)
                    .with_id(id)
                    .with_name(name)
                    .with_arguments(arguments),
            )]);
        }

        /// Queue a round whose request fails before any event.
        pub fn queue_open_error(&self, err: LlmError) {
            self.rounds.lock().unwrap().push_back(MockRound::OpenError(err));
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ToolAwareLlmProvider for MockLlmProvider {
        async fn stream_round(
            &self,
            turns: &[ChatTurn],
            tools: &[ToolDefinition],
            model: &str,
        ) -> Result<ProviderStream, LlmError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                turns: turns.to_vec(),
                tools: tools.to_vec(),
                model: model.to_string(),
            });

            let round = self
                .rounds
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(MockRound::Steps(Vec::new()));

            let steps = match round {
                MockRound::OpenError(err) => return Err(err),
                MockRound::Steps(steps) => VecDeque::from(steps),
            };

            let events = stream::unfold(steps, |mut steps| async move {
                loop {
                    match steps.pop_front()? {
                        MockStep::Event(evt) => return Some((Ok(evt), steps)),
                        MockStep::Error(err) => return Some((Err(err), steps)),
                        MockStep::Delay(d) => tokio::time::sleep(d).await,
                        MockStep::Hang => futures::future::pending::<()>().await,
                    }
                }
            });
            Ok(Box::pin(events))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}
