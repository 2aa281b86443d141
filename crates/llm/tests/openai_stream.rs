//! OpenAI transport end-to-end against a mock HTTP server.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use acacia_core::config::{LlmConfig, OrchestrationConfig};
use acacia_core::{ChatError, Message, RequestContext, StreamChunk};
use acacia_llm::ProviderRegistry;
use acacia_tool_runtime::{CalculateTool, Tool, ToolRegistry};

fn sse(frames: &[Value]) -> String {
    let mut body: String = frames.iter().map(|f| format!("data: {f}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn stream_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn registry(server: &MockServer) -> ProviderRegistry {
    let tools = ToolRegistry::from_tools([Arc::new(CalculateTool) as Arc<dyn Tool>]).unwrap();
    ProviderRegistry::from_config(
        &LlmConfig {
            openai_base_url: server.uri(),
            anthropic_base_url: server.uri(),
            anthropic_max_tokens: 512,
        },
        &OrchestrationConfig::default(),
        Arc::new(tools),
    )
}

async fn run(server: &MockServer, prompt: &str) -> Vec<StreamChunk> {
    let adapter = registry(server).get_provider("openai", "sk-test").unwrap();
    let mut rx = adapter.stream_with_tools(
        vec![Message::user(prompt)],
        "gpt-4o-mini".into(),
        RequestContext::anonymous(),
    );
    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        chunks.push(chunk);
    }
    chunks
}

fn text(chunks: &[StreamChunk]) -> String {
    chunks.iter().map(|c| c.content.as_str()).collect()
}

#[tokio::test]
async fn test_text_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(stream_response(sse(&[
            json!({"choices": [{"delta": {"role": "assistant", "content": ""}}]}),
            json!({"choices": [{"delta": {"content": "Hel"}}]}),
            json!({"choices": [{"delta": {"content": "lo"}}]}),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let chunks = run(&server, "hi").await;

    assert_eq!(
        chunks,
        vec![
            StreamChunk::content("Hel"),
            StreamChunk::content("lo"),
            StreamChunk::done(),
        ]
    );

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
    assert_eq!(body["tools"][0]["function"]["name"], "calculate");
}

#[tokio::test]
async fn test_tool_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(stream_response(sse(&[
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": "call_1", "type": "function", "function": {"name": "calculate", "arguments": ""}}]}}]}),
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"expr\":"}}]}}]}),
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "\"2+2\"}"}}]}}]}),
            json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(stream_response(sse(&[
            json!({"choices": [{"delta": {"content": "The answer is "}}]}),
            json!({"choices": [{"delta": {"content": "4"}}]}),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let chunks = run(&server, "what is 2+2?").await;

    assert_eq!(text(&chunks), "The answer is 4");
    assert_eq!(chunks.last(), Some(&StreamChunk::done()));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = requests[1].body_json().unwrap();
    let messages = second["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["tool_calls"][0]["id"], "call_1");
    assert_eq!(messages[1]["tool_calls"][0]["function"]["arguments"], "{\"expr\":\"2+2\"}");
    assert_eq!(
        messages[2],
        json!({"role": "tool", "tool_call_id": "call_1", "content": "4"})
    );
}

#[tokio::test]
async fn test_unauthorized_is_invalid_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"bad key"}}"#))
        .mount(&server)
        .await;

    let chunks = run(&server, "hi").await;
    assert_eq!(chunks, vec![StreamChunk::failed(ChatError::InvalidCredential)]);
}

#[tokio::test]
async fn test_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let chunks = run(&server, "hi").await;
    assert_eq!(chunks, vec![StreamChunk::failed(ChatError::RateLimited)]);
}

#[tokio::test]
async fn test_server_error_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let chunks = run(&server, "hi").await;
    assert_eq!(chunks.len(), 1);
    match &chunks[0].error {
        Some(ChatError::Provider(msg)) => assert!(msg.contains("upstream exploded")),
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_end_without_done_is_clean() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(stream_response(format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": "partial"}}]})
        )))
        .mount(&server)
        .await;

    let chunks = run(&server, "hi").await;
    assert_eq!(chunks, vec![StreamChunk::content("partial"), StreamChunk::done()]);
}

#[tokio::test]
async fn test_in_band_error_after_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(stream_response(format!(
            "data: {}\n\ndata: {}\n\n",
            json!({"choices": [{"delta": {"content": "partial"}}]}),
            json!({"error": {"message": "model overloaded", "type": "server_error"}})
        )))
        .mount(&server)
        .await;

    let chunks = run(&server, "hi").await;
    assert_eq!(chunks[0], StreamChunk::content("partial"));
    assert_eq!(
        chunks[1],
        StreamChunk::failed(ChatError::Provider("Stream error: model overloaded".into()))
    );
    assert_eq!(chunks.len(), 2);
}
