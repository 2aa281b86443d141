//! SSE event parsing and content-block state tracking for the Messages stream.

use serde_json::Value;
use tracing::{debug, trace};

use acacia_tool_runtime::{LlmError, ProviderEvent, ToolCallDelta};

use crate::sse::SseFrame;
use crate::transport::FrameTranslator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Unknown,
    Text,
    /// A tool_use block and its dense ordinal among the round's tool calls.
    ToolUse(usize),
}

/// Maps content-block indices to tool-call ordinals.
///
/// Anthropic numbers every content block, text included, so a tool call may
/// arrive at block index 1 after a text block at 0. The accumulator only wants
/// tool calls, numbered from 0 with no gaps.
#[derive(Debug, Default)]
pub(super) struct BlockTracker {
    blocks: Vec<BlockKind>,
    tool_count: usize,
}

impl BlockTracker {
    pub(super) fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, index: usize, kind: BlockKind) {
        if index >= self.blocks.len() {
            self.blocks.resize(index + 1, BlockKind::Unknown);
        }
        self.blocks[index] = kind;
    }

    pub(super) fn register_text(&mut self, index: usize) {
        self.register(index, BlockKind::Text);
    }

    /// Register a tool_use block and return its ordinal.
    pub(super) fn register_tool(&mut self, index: usize) -> usize {
        if let Some(BlockKind::ToolUse(ordinal)) = self.blocks.get(index) {
            return *ordinal;
        }
        let ordinal = self.tool_count;
        self.tool_count += 1;
        self.register(index, BlockKind::ToolUse(ordinal));
        ordinal
    }

    pub(super) fn tool_ordinal(&self, index: usize) -> Option<usize> {
        match self.blocks.get(index) {
            Some(BlockKind::ToolUse(ordinal)) => Some(*ordinal),
            _ => None,
        }
    }
}

/// Per-round stream state.
#[derive(Debug, Default)]
pub(super) struct EventTranslator {
    tracker: BlockTracker,
    finished: bool,
}

impl EventTranslator {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Parse a single SSE event (type + data) into zero or more events.
    pub(super) fn handle_event(
        &mut self,
        event_type: &str,
        parsed: &Value,
    ) -> Result<Vec<ProviderEvent>, LlmError> {
        let mut events = Vec::new();
        let index = parsed["index"].as_u64().map(|i| i as usize);

        match event_type {
            "content_block_start" => {
                let index = index.ok_or_else(|| missing_index(event_type))?;
                let block = &parsed["content_block"];
                match block["type"].as_str() {
                    Some("text") => {
                        self.tracker.register_text(index);
                        if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                            events.push(ProviderEvent::Content(text.to_string()));
                        }
                    }
                    Some("tool_use") => {
                        let ordinal = self.tracker.register_tool(index);
                        let mut delta = ToolCallDelta::new(ordinal);
                        delta.id = block["id"].as_str().map(String::from);
                        delta.name = block["name"].as_str().map(String::from);
                        events.push(ProviderEvent::ToolCall(delta));
                    }
                    other => trace!(?other, index, "ignoring content block"),
                }
            }
            "content_block_delta" => {
                let index = index.ok_or_else(|| missing_index(event_type))?;
                let delta = &parsed["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        if let Some(text) = delta["text"].as_str().filter(|t| !t.is_empty()) {
                            events.push(ProviderEvent::Content(text.to_string()));
                        }
                    }
                    Some("input_json_delta") => {
                        let ordinal = self.tracker.tool_ordinal(index).ok_or_else(|| {
                            LlmError::InvalidResponse(format!(
                                "input_json_delta for non-tool block {index}"
                            ))
                        })?;
                        if let Some(partial) = delta["partial_json"].as_str() {
                            events.push(ProviderEvent::ToolCall(
                                ToolCallDelta::new(ordinal).with_arguments(partial),
                            ));
                        }
                    }
                    other => trace!(?other, index, "ignoring content delta"),
                }
            }
            "message_delta" => {
                if let Some(reason) = parsed["delta"]["stop_reason"].as_str() {
                    debug!(stop_reason = reason, "message delta");
                }
            }
            "message_stop" => {
                self.finished = true;
            }
            "error" => {
                let kind = parsed["error"]["type"].as_str().unwrap_or_default();
                let message = parsed["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown stream error")
                    .to_string();
                return Err(match kind {
                    "rate_limit_error" => LlmError::RateLimited {
                        retry_after_secs: None,
                    },
                    "authentication_error" | "permission_error" => LlmError::AuthError,
                    _ => LlmError::StreamError(message),
                });
            }
            "message_start" | "content_block_stop" | "ping" => {}
            _ => {
                trace!(event_type, "ignoring unknown SSE event type");
            }
        }

        Ok(events)
    }
}

fn missing_index(event_type: &str) -> LlmError {
    LlmError::InvalidResponse(format!("{event_type} without index"))
}

impl FrameTranslator for EventTranslator {
    fn translate(&mut self, frame: &SseFrame) -> Result<Vec<ProviderEvent>, LlmError> {
        let parsed: Value = serde_json::from_str(&frame.data)
            .map_err(|e| LlmError::InvalidResponse(format!("malformed event data: {e}")))?;
        // The data payload repeats the event name; fall back to it when the
        // `event:` line is absent.
        let event_type = frame
            .event
            .clone()
            .or_else(|| parsed["type"].as_str().map(String::from))
            .unwrap_or_default();
        self.handle_event(&event_type, &parsed)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
