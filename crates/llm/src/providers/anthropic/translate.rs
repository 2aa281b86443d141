//! Translation between provider-agnostic history types and the Messages API format.

use serde_json::{json, Map, Value};

use acacia_tool_runtime::{ChatTurn, ToolDefinition};

/// Translate a [`ToolDefinition`] into the Anthropic tool format.
pub(super) fn tool_definition_to_anthropic(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

/// Request history split the way the Messages API wants it.
#[derive(Debug, Default)]
pub(super) struct AnthropicHistory {
    /// System turns joined by blank lines; the API has no system role.
    pub system: Option<String>,
    pub messages: Vec<Value>,
}

/// Translate turns into a system prompt plus the `messages` array.
///
/// Consecutive tool turns become one user message holding several
/// `tool_result` blocks.
pub(super) fn turns_to_anthropic(turns: &[ChatTurn]) -> AnthropicHistory {
    let mut system: Vec<&str> = Vec::new();
    let mut messages: Vec<Value> = Vec::new();
    let mut pending_results: Vec<Value> = Vec::new();

    for turn in turns {
        if !matches!(turn, ChatTurn::Tool(_)) && !pending_results.is_empty() {
            messages.push(tool_results_message(std::mem::take(&mut pending_results)));
        }
        match turn {
            ChatTurn::System(text) => system.push(text),
            ChatTurn::User(text) => messages.push(json!({"role": "user", "content": text})),
            ChatTurn::Assistant { text, tool_calls } => {
                let mut blocks: Vec<Value> = Vec::new();
                if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                    blocks.push(json!({"type": "text", "text": text}));
                }
                for tc in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": arguments_to_input(&tc.arguments),
                    }));
                }
                // The API rejects empty content.
                if !blocks.is_empty() {
                    messages.push(json!({"role": "assistant", "content": blocks}));
                }
            }
            ChatTurn::Tool(result) => pending_results.push(json!({
                "type": "tool_result",
                "tool_use_id": result.tool_call_id,
                "content": result.content,
            })),
        }
    }
    if !pending_results.is_empty() {
        messages.push(tool_results_message(pending_results));
    }

    AnthropicHistory {
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages,
    }
}

fn tool_results_message(blocks: Vec<Value>) -> Value {
    json!({"role": "user", "content": blocks})
}

/// `tool_use.input` must be an object; the loop only replays calls whose
/// arguments already parsed, so anything else means an argument-less call.
fn arguments_to_input(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(v @ Value::Object(_)) => v,
        _ => Value::Object(Map::new()),
    }
}
