use crate::accumulator::ToolCallBuffer;
use crate::history::ChatTurn;
use crate::provider::{ProviderStream, ToolAwareLlmProvider};
use crate::registry::ToolRegistry;
use crate::stream::ProviderEvent;
use crate::tool::{render_output, ToolCall, ToolDefinition, ToolError, ToolResult};
use acacia_core::{ChatError, Message, RequestContext, StreamChunk};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Receiving end of a reply stream. Channel closure means end of stream.
pub type ChunkReceiver = mpsc::Receiver<StreamChunk>;

/// Vendor-agnostic streaming entry point handed out by the provider registry.
pub trait ChatStreamer: Send + Sync {
    /// Start a reply. Returns immediately; the work runs in a background task
    /// that sends content chunks followed by exactly one terminal chunk.
    fn stream_with_tools(
        &self,
        messages: Vec<Message>,
        model: String,
        context: RequestContext,
    ) -> ChunkReceiver;

    fn provider_name(&self) -> &str;
}

/// Limits applied to every reply.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_rounds: usize,
    pub round_timeout: Option<Duration>,
    pub buffer: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            round_timeout: Some(Duration::from_secs(120)),
            buffer: 32,
        }
    }
}

impl From<&acacia_core::config::OrchestrationConfig> for LoopSettings {
    fn from(cfg: &acacia_core::config::OrchestrationConfig) -> Self {
        Self {
            max_rounds: cfg.max_rounds.max(1),
            round_timeout: cfg.round_timeout(),
            buffer: cfg.stream_buffer.max(1),
        }
    }
}

/// The core agentic loop that orchestrates LLM ↔ Tool execution.
///
/// Flow: history → LLM round → (tool calls → execute → results → LLM round)* → final text
///
/// Text deltas are forwarded as they arrive; tool-call fragments are
/// accumulated silently and executed one after another once the round ends.
#[derive(Clone)]
pub struct AgenticLoop {
    provider: Arc<dyn ToolAwareLlmProvider>,
    registry: Arc<ToolRegistry>,
    settings: LoopSettings,
}

impl AgenticLoop {
    pub fn new(provider: Arc<dyn ToolAwareLlmProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            settings: LoopSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.settings.max_rounds = max.max(1);
        self
    }

    pub fn with_round_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.round_timeout = timeout;
        self
    }

    /// Drive every round of one reply, sending content chunks on `tx`.
    /// Returns how the reply ended; the caller turns that into the terminal chunk.
    async fn run(
        &self,
        messages: Vec<Message>,
        model: &str,
        context: &RequestContext,
        tx: &mpsc::Sender<StreamChunk>,
    ) -> Result<(), ChatError> {
        let tools = self.registry.list_tools();
        let mut turns = ChatTurn::from_messages(&messages);

        for round in 0..self.settings.max_rounds {
            debug!(round, provider = self.provider.provider_name(), "starting round");

            let (text, calls) = self.stream_round(&turns, &tools, model, context, tx).await?;

            if calls.is_empty() {
                info!(round, "reply complete (no tool calls)");
                return Ok(());
            }

            info!(round, count = calls.len(), "executing tool calls");
            let results = self.execute_tool_calls(&calls, context, tx).await?;

            turns.push(ChatTurn::Assistant {
                text: (!text.is_empty()).then_some(text),
                tool_calls: calls,
            });
            turns.extend(results.into_iter().map(ChatTurn::Tool));
        }

        warn!(max = self.settings.max_rounds, "tool-calling round limit reached");
        Err(ChatError::RoundLimitExceeded(self.settings.max_rounds))
    }

    /// One vendor round: forward text, accumulate tool-call fragments.
    async fn stream_round(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolDefinition],
        model: &str,
        context: &RequestContext,
        tx: &mpsc::Sender<StreamChunk>,
    ) -> Result<(String, Vec<ToolCall>), ChatError> {
        let deadline = self.settings.round_timeout.map(|t| Instant::now() + t);

        let mut stream: ProviderStream = self
            .within_round(
                deadline,
                context,
                tx,
                self.provider.stream_round(turns, tools, model),
            )
            .await?
            .map_err(ChatError::from)?;

        let mut text = String::new();
        let mut buffer = ToolCallBuffer::new();

        while let Some(event) = self.within_round(deadline, context, tx, stream.next()).await? {
            match event.map_err(ChatError::from)? {
                ProviderEvent::Content(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    text.push_str(&delta);
                    emit(tx, context, StreamChunk::content(delta)).await?;
                }
                ProviderEvent::ToolCall(delta) => buffer.apply(&delta),
            }
        }

        Ok((text, buffer.into_calls()))
    }

    /// Await a vendor future, racing it against cancellation, a gone
    /// consumer and the round deadline.
    async fn within_round<F: std::future::Future>(
        &self,
        deadline: Option<Instant>,
        context: &RequestContext,
        tx: &mpsc::Sender<StreamChunk>,
        fut: F,
    ) -> Result<F::Output, ChatError> {
        let timed = async {
            match deadline {
                Some(at) => tokio::time::timeout_at(at, fut).await.map_err(|_| {
                    ChatError::RoundTimeout(self.settings.round_timeout.unwrap_or_default())
                }),
                None => Ok(fut.await),
            }
        };
        tokio::select! {
            biased;
            err = stopped(context, tx) => Err(err),
            out = timed => out,
        }
    }

    /// Execute calls sequentially in accumulation order. The first failure
    /// aborts the whole round.
    async fn execute_tool_calls(
        &self,
        calls: &[ToolCall],
        context: &RequestContext,
        tx: &mpsc::Sender<StreamChunk>,
    ) -> Result<Vec<ToolResult>, ChatError> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if context.is_cancelled() || tx.is_closed() {
                return Err(ChatError::Cancelled);
            }
            info!(tool = %call.name, id = %call.id, "executing tool");

            let args = parse_arguments(call)?;

            let tool = self.registry.get_tool(&call.name).ok_or_else(|| {
                error!(tool = %call.name, "unknown tool requested");
                ChatError::UnknownTool(call.name.clone())
            })?;

            let output = tokio::select! {
                biased;
                err = stopped(context, tx) => return Err(err),
                out = tool.execute(args, context) => out,
            };

            let output = output.map_err(|e| {
                error!(tool = %call.name, error = %e, "tool execution failed");
                match e {
                    ToolError::Cancelled => ChatError::Cancelled,
                    other => ChatError::ToolExecution {
                        tool: call.name.clone(),
                        message: other.to_string(),
                    },
                }
            })?;

            debug!(tool = %call.name, "tool execution completed");
            results.push(ToolResult {
                tool_call_id: call.id.clone(),
                content: render_output(&output),
            });
        }

        Ok(results)
    }
}

impl ChatStreamer for AgenticLoop {
    fn stream_with_tools(
        &self,
        messages: Vec<Message>,
        model: String,
        context: RequestContext,
    ) -> ChunkReceiver {
        let (tx, rx) = mpsc::channel(self.settings.buffer);
        let agentic_loop = self.clone();

        tokio::spawn(async move {
            let terminal = match agentic_loop.run(messages, &model, &context, &tx).await {
                Ok(()) => StreamChunk::done(),
                Err(e) => {
                    warn!(error = %e, "reply ended with error");
                    StreamChunk::failed(e)
                }
            };
            // A gone consumer has nothing left to be told.
            let _ = tx.send(terminal).await;
        });

        rx
    }

    fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }
}

/// Resolves once the reply should stop: the caller cancelled or the
/// consumer dropped its receiver.
async fn stopped(context: &RequestContext, tx: &mpsc::Sender<StreamChunk>) -> ChatError {
    tokio::select! {
        biased;
        _ = context.cancel.cancelled() => {}
        _ = tx.closed() => debug!("consumer dropped the stream"),
    }
    ChatError::Cancelled
}

/// Send one content chunk, blocking on backpressure unless cancelled.
async fn emit(
    tx: &mpsc::Sender<StreamChunk>,
    context: &RequestContext,
    chunk: StreamChunk,
) -> Result<(), ChatError> {
    tokio::select! {
        biased;
        _ = context.cancel.cancelled() => Err(ChatError::Cancelled),
        sent = tx.send(chunk) => sent.map_err(|_| {
            debug!("consumer dropped the stream");
            ChatError::Cancelled
        }),
    }
}

fn parse_arguments(call: &ToolCall) -> Result<Map<String, Value>, ChatError> {
    // Some vendors send an empty string for argument-less calls.
    if call.arguments.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str::<Map<String, Value>>(&call.arguments).map_err(|e| {
        error!(tool = %call.name, error = %e, "failed to parse tool arguments");
        ChatError::ToolArgumentParse {
            tool: call.name.clone(),
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockLlmProvider, MockStep};
    use crate::provider::LlmError;
    use crate::stream::ToolCallDelta;
    use crate::tool::Tool;
    use async_trait::async_trait;
    use serde_json::json;

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "add".into(),
                description: "Add two numbers".into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                    "required": ["a", "b"]
                }),
            }
        }

        async fn execute(
            &self,
            args: Map<String, Value>,
            _context: &RequestContext,
        ) -> Result<Value, ToolError> {
            let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(a + b))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "fail".into(),
                description: "Always fails".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn execute(
            &self,
            _args: Map<String, Value>,
            _context: &RequestContext,
        ) -> Result<Value, ToolError> {
            Err(ToolError::ExecutionFailed("backend unavailable".into()))
        }
    }

    /// Sleeps, then records that it ran to completion.
    struct SlowTool {
        finished: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Tool for SlowTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "slow".into(),
                description: "Takes a while".into(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn execute(
            &self,
            _args: Map<String, Value>,
            _context: &RequestContext,
        ) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.finished.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(json!("done"))
        }
    }

    fn agentic_loop(mock: &MockLlmProvider) -> AgenticLoop {
        let registry = ToolRegistry::from_tools([
            Arc::new(AddTool) as Arc<dyn Tool>,
            Arc::new(FailingTool) as Arc<dyn Tool>,
        ])
        .unwrap();
        AgenticLoop::new(Arc::new(mock.clone()), Arc::new(registry))
    }

    async fn collect(mut rx: ChunkReceiver) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    fn text_of(chunks: &[StreamChunk]) -> String {
        chunks.iter().map(|c| c.content.as_str()).collect()
    }

    fn assert_single_terminal(chunks: &[StreamChunk]) {
        let terminals = chunks.iter().filter(|c| c.done).count();
        assert_eq!(terminals, 1, "expected exactly one terminal chunk: {chunks:?}");
        assert!(chunks.last().unwrap().done, "terminal chunk must be last");
        assert!(chunks[..chunks.len() - 1].iter().all(|c| c.error.is_none()));
    }

    fn run(lp: &AgenticLoop, prompt: &str) -> ChunkReceiver {
        lp.stream_with_tools(
            vec![Message::user(prompt)],
            "test-model".into(),
            RequestContext::anonymous(),
        )
    }

    #[tokio::test]
    async fn test_text_only_round() {
        let mock = MockLlmProvider::new();
        mock.queue_text(&["Hel", "lo"]);

        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;

        assert_single_terminal(&chunks);
        assert_eq!(text_of(&chunks), "Hello");
        assert!(chunks.last().unwrap().error.is_none());
        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.requests()[0].model, "test-model");
        assert_eq!(mock.requests()[0].tools.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_then_final_text() {
        let mock = MockLlmProvider::new();
        mock.queue_response(vec![
            ProviderEvent::ToolCall(ToolCallDelta::new(0).with_id("call_1").with_name("add")),
            ProviderEvent::ToolCall(ToolCallDelta::new(0).with_arguments(r#"{"a":2,"#)),
            ProviderEvent::ToolCall(ToolCallDelta::new(0).with_arguments(r#""b":2}"#)),
        ]);
        mock.queue_text(&["The answer is ", "4"]);

        let chunks = collect(run(&agentic_loop(&mock), "what is 2+2?")).await;

        assert_single_terminal(&chunks);
        assert_eq!(text_of(&chunks), "The answer is 4");

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1].turns;
        assert_eq!(second.len(), 3);
        assert_eq!(second[0], ChatTurn::User("what is 2+2?".into()));
        assert_eq!(
            second[1],
            ChatTurn::Assistant {
                text: None,
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    name: "add".into(),
                    arguments: r#"{"a":2,"b":2}"#.into(),
                }],
            }
        );
        assert_eq!(
            second[2],
            ChatTurn::Tool(ToolResult {
                tool_call_id: "call_1".into(),
                content: "4".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_text_before_tool_call_is_forwarded_and_replayed() {
        let mock = MockLlmProvider::new();
        mock.queue_response(vec![
            ProviderEvent::Content("Let me check. ".into()),
            ProviderEvent::ToolCall(
                ToolCallDelta::new(0)
                    .with_id("call_1")
                    .with_name("add")
                    .with_arguments(r#"{"a":1,"b":1}"#),
            ),
        ]);
        mock.queue_text(&["2"]);

        let chunks = collect(run(&agentic_loop(&mock), "1+1")).await;

        assert_eq!(text_of(&chunks), "Let me check. 2");
        match &mock.requests()[1].turns[1] {
            ChatTurn::Assistant { text, tool_calls } => {
                assert_eq!(text.as_deref(), Some("Let me check. "));
                assert_eq!(tool_calls.len(), 1);
            }
            other => panic!("expected assistant turn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multiple_calls_execute_in_index_order() {
        let mock = MockLlmProvider::new();
        mock.queue_response(vec![
            ProviderEvent::ToolCall(
                ToolCallDelta::new(1)
                    .with_id("call_b")
                    .with_name("add")
                    .with_arguments(r#"{"a":10,"b":10}"#),
            ),
            ProviderEvent::ToolCall(
                ToolCallDelta::new(0)
                    .with_id("call_a")
                    .with_name("add")
                    .with_arguments(r#"{"a":1,"b":1}"#),
            ),
        ]);
        mock.queue_text(&["done"]);

        collect(run(&agentic_loop(&mock), "go")).await;

        let turns = &mock.requests()[1].turns;
        assert_eq!(
            turns[2],
            ChatTurn::Tool(ToolResult {
                tool_call_id: "call_a".into(),
                content: "2".into(),
            })
        );
        assert_eq!(
            turns[3],
            ChatTurn::Tool(ToolResult {
                tool_call_id: "call_b".into(),
                content: "20".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_leading_empty_slots_abort_as_unknown_tool() {
        let mock = MockLlmProvider::new();
        // Only index 2 ever arrives; slots 0 and 1 stay empty and slot 0 runs first.
        mock.queue_response(vec![ProviderEvent::ToolCall(
            ToolCallDelta::new(2)
                .with_id("call_3")
                .with_name("add")
                .with_arguments(r#"{"a":1,"b":1}"#),
        )]);
        mock.queue_text(&["never"]);

        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;

        assert_eq!(chunks, vec![StreamChunk::failed(ChatError::UnknownTool(String::new()))]);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts() {
        let mock = MockLlmProvider::new();
        mock.queue_tool_call("call_1", "does_not_exist", "{}");

        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;

        assert_single_terminal(&chunks);
        assert_eq!(
            chunks.last().unwrap().error,
            Some(ChatError::UnknownTool("does_not_exist".into()))
        );
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_arguments_abort() {
        let mock = MockLlmProvider::new();
        mock.queue_tool_call("call_1", "add", r#"{"a":1"#);

        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;

        assert_single_terminal(&chunks);
        assert!(matches!(
            chunks.last().unwrap().error,
            Some(ChatError::ToolArgumentParse { ref tool, .. }) if tool == "add"
        ));
    }

    #[tokio::test]
    async fn test_non_object_arguments_abort() {
        let mock = MockLlmProvider::new();
        mock.queue_tool_call("call_1", "add", "[1,2]");

        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;

        assert!(matches!(
            chunks.last().unwrap().error,
            Some(ChatError::ToolArgumentParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_tool_failure_aborts() {
        let mock = MockLlmProvider::new();
        mock.queue_tool_call("call_1", "fail", "{}");

        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;

        assert_single_terminal(&chunks);
        assert_eq!(
            chunks.last().unwrap().error,
            Some(ChatError::ToolExecution {
                tool: "fail".into(),
                message: "Execution failed: backend unavailable".into(),
            })
        );
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_vendor_errors_are_classified() {
        let mock = MockLlmProvider::new();
        mock.queue_open_error(LlmError::AuthError);
        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;
        assert_eq!(chunks.last().unwrap().error, Some(ChatError::InvalidCredential));

        mock.queue_open_error(LlmError::RateLimited {
            retry_after_secs: Some(1),
        });
        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;
        assert_eq!(chunks.last().unwrap().error, Some(ChatError::RateLimited));
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_emitted_content() {
        let mock = MockLlmProvider::new();
        mock.queue_steps(vec![
            MockStep::Event(ProviderEvent::Content("partial".into())),
            MockStep::Error(LlmError::StreamError("connection reset".into())),
        ]);

        let chunks = collect(run(&agentic_loop(&mock), "hi")).await;

        assert_single_terminal(&chunks);
        assert_eq!(chunks[0], StreamChunk::content("partial"));
        assert!(matches!(chunks.last().unwrap().error, Some(ChatError::Provider(_))));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let mock = MockLlmProvider::new();
        for i in 0..3 {
            mock.queue_tool_call(&format!("call_{i}"), "add", r#"{"a":1,"b":1}"#);
        }

        let lp = agentic_loop(&mock).with_max_rounds(2);
        let chunks = collect(run(&lp, "loop forever")).await;

        assert_single_terminal(&chunks);
        assert_eq!(chunks.last().unwrap().error, Some(ChatError::RoundLimitExceeded(2)));
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_timeout() {
        let mock = MockLlmProvider::new();
        mock.queue_steps(vec![
            MockStep::Event(ProviderEvent::Content("thinking".into())),
            MockStep::Hang,
        ]);

        let lp = agentic_loop(&mock).with_round_timeout(Some(Duration::from_secs(5)));
        let chunks = collect(run(&lp, "hi")).await;

        assert_single_terminal(&chunks);
        assert_eq!(
            chunks.last().unwrap().error,
            Some(ChatError::RoundTimeout(Duration::from_secs(5)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_stream() {
        let mock = MockLlmProvider::new();
        mock.queue_steps(vec![
            MockStep::Event(ProviderEvent::Content("first".into())),
            MockStep::Delay(Duration::from_secs(1)),
            MockStep::Event(ProviderEvent::Content("second".into())),
        ]);

        let ctx = RequestContext::anonymous();
        let cancel = ctx.cancel.clone();
        let mut rx = agentic_loop(&mock).stream_with_tools(
            vec![Message::user("hi")],
            "m".into(),
            ctx,
        );

        assert_eq!(rx.recv().await, Some(StreamChunk::content("first")));
        cancel.cancel();

        let rest = collect(rx).await;
        assert_eq!(rest, vec![StreamChunk::failed(ChatError::Cancelled)]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mock = MockLlmProvider::new();
        mock.queue_text(&["never"]);

        let ctx = RequestContext::anonymous();
        ctx.cancel.cancel();
        let rx = agentic_loop(&mock).stream_with_tools(vec![Message::user("hi")], "m".into(), ctx);

        let chunks = collect(rx).await;
        assert_eq!(chunks, vec![StreamChunk::failed(ChatError::Cancelled)]);
    }

    #[tokio::test]
    async fn test_backpressure_with_small_buffer() {
        let mock = MockLlmProvider::new();
        let fragments: Vec<String> = (0..20).map(|i| format!("{i},")).collect();
        let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
        mock.queue_text(&refs);

        let lp = agentic_loop(&mock).with_settings(LoopSettings {
            buffer: 1,
            ..LoopSettings::default()
        });
        let chunks = collect(run(&lp, "count")).await;

        assert_single_terminal(&chunks);
        assert_eq!(text_of(&chunks), fragments.concat());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_consumer_stops_tool_round() {
        let mock = MockLlmProvider::new();
        mock.queue_response(vec![
            ProviderEvent::Content("looking".into()),
            ProviderEvent::ToolCall(ToolCallDelta::new(0).with_id("call_1").with_name("slow")),
        ]);
        mock.queue_steps(vec![MockStep::Hang]);

        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let registry = ToolRegistry::from_tools([Arc::new(SlowTool {
            finished: Arc::clone(&finished),
        }) as Arc<dyn Tool>])
        .unwrap();
        let lp = AgenticLoop::new(Arc::new(mock.clone()), Arc::new(registry));

        let mut rx = run(&lp, "hi");
        assert_eq!(rx.recv().await, Some(StreamChunk::content("looking")));
        drop(rx);

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(mock.request_count(), 1, "no vendor round after the consumer left");
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(Arc::strong_count(&lp.provider), 1, "producer task still alive");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_consumer_stops_silent_vendor() {
        let mock = MockLlmProvider::new();
        mock.queue_steps(vec![
            MockStep::Event(ProviderEvent::Content("first".into())),
            MockStep::Hang,
        ]);
        let lp = agentic_loop(&mock).with_round_timeout(None);

        let mut rx = run(&lp, "hi");
        assert_eq!(rx.recv().await, Some(StreamChunk::content("first")));
        // The producer task holds its own handle on the provider.
        assert_eq!(Arc::strong_count(&lp.provider), 2);
        drop(rx);

        // No deadline is set, so only the closed channel can end the hung round.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(Arc::strong_count(&lp.provider), 1, "producer task still alive");
        assert_eq!(mock.request_count(), 1);
    }
}
