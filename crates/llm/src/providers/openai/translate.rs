//! Translation between provider-agnostic history types and the OpenAI format.

use serde_json::{json, Value};

use acacia_tool_runtime::{ChatTurn, ToolDefinition};

/// Translate a [`ToolDefinition`] into the OpenAI function-tool format.
pub(super) fn tool_definition_to_openai(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        },
    })
}

/// Translate a [`ChatTurn`] into an OpenAI message object.
pub(super) fn turn_to_openai(turn: &ChatTurn) -> Value {
    match turn {
        ChatTurn::System(text) => json!({"role": "system", "content": text}),
        ChatTurn::User(text) => json!({"role": "user", "content": text}),
        ChatTurn::Assistant { text, tool_calls } => {
            let mut msg = json!({
                "role": "assistant",
                "content": text,
            });
            if !tool_calls.is_empty() {
                // Arguments are replayed as the exact text the model produced.
                msg["tool_calls"] = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments,
                            },
                        })
                    })
                    .collect();
            }
            msg
        }
        ChatTurn::Tool(result) => json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id,
            "content": result.content,
        }),
    }
}
