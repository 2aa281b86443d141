//! Chunk parsing for the Chat Completions stream.

use serde::Deserialize;
use tracing::trace;

use acacia_tool_runtime::{LlmError, ProviderEvent, ToolCallDelta};

use crate::sse::SseFrame;
use crate::transport::FrameTranslator;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallChunk {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize)]
struct FunctionChunk {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Parse one `data:` payload into zero or more events.
pub(super) fn parse_chunk(data: &str) -> Result<Vec<ProviderEvent>, LlmError> {
    let payload: ChunkPayload = serde_json::from_str(data)
        .map_err(|e| LlmError::InvalidResponse(format!("malformed stream chunk: {e}")))?;

    if let Some(err) = payload.error {
        return Err(match err.kind.as_deref() {
            Some("rate_limit_error") | Some("rate_limit_exceeded") => LlmError::RateLimited {
                retry_after_secs: None,
            },
            _ => LlmError::StreamError(err.message),
        });
    }

    let mut events = Vec::new();
    // Only one choice is ever requested.
    let Some(delta) = payload.choices.into_iter().next().and_then(|c| c.delta) else {
        return Ok(events);
    };

    if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
        events.push(ProviderEvent::Content(text));
    }

    for tc in delta.tool_calls.unwrap_or_default() {
        let (name, arguments) = match tc.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        events.push(ProviderEvent::ToolCall(ToolCallDelta {
            index: tc.index,
            id: tc.id,
            name,
            arguments,
        }));
    }

    Ok(events)
}

/// Per-round stream state: the round ends at the `[DONE]` sentinel.
#[derive(Debug, Default)]
pub(super) struct ChunkTranslator {
    finished: bool,
}

impl FrameTranslator for ChunkTranslator {
    fn translate(&mut self, frame: &SseFrame) -> Result<Vec<ProviderEvent>, LlmError> {
        let data = frame.data.trim();
        if data == DONE_SENTINEL {
            trace!("received [DONE]");
            self.finished = true;
            return Ok(Vec::new());
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }
        parse_chunk(data)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
