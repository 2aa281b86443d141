//! Reassembly of tool calls streamed as index-addressed fragments.

use crate::stream::ToolCallDelta;
use crate::tool::ToolCall;

/// Partial state of one tool call within a round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub function_name: String,
    pub arguments: String,
}

impl ToolCallAccumulator {
    fn merge(&mut self, delta: &ToolCallDelta) {
        // The id arrives once; later repeats never replace it.
        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            if self.id.is_empty() {
                self.id = id.to_string();
            }
        }
        if let Some(name) = &delta.name {
            self.function_name.push_str(name);
        }
        if let Some(args) = &delta.arguments {
            self.arguments.push_str(args);
        }
    }
}

/// Accumulators for one round, indexed by vendor position.
///
/// Created empty at round start and dropped at round end.
#[derive(Debug, Default)]
pub struct ToolCallBuffer {
    slots: Vec<ToolCallAccumulator>,
}

impl ToolCallBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment, growing the slot list with empty entries if the
    /// index is beyond the current end.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        if delta.index >= self.slots.len() {
            self.slots.resize_with(delta.index + 1, ToolCallAccumulator::default);
        }
        self.slots[delta.index].merge(delta);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[ToolCallAccumulator] {
        &self.slots
    }

    /// Finish the round: the accumulated calls in index order.
    pub fn into_calls(self) -> Vec<ToolCall> {
        self.slots
            .into_iter()
            .map(|acc| ToolCall {
                id: acc.id,
                name: acc.function_name,
                arguments: acc.arguments,
            })
            .collect()
    }
}
