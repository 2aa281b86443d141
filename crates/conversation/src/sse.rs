//! Mapping reply chunks onto server-sent events for HTTP callers.

use std::fmt;

use acacia_core::{ChatError, StreamChunk};

/// One event of the `text/event-stream` reply body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Message(String),
    Done,
    Error(String),
}

impl SseEvent {
    /// `None` for chunks that carry nothing worth sending (empty content).
    pub fn from_chunk(chunk: &StreamChunk) -> Option<Self> {
        if let Some(err) = &chunk.error {
            return Some(Self::from_error(err));
        }
        if chunk.done {
            return Some(SseEvent::Done);
        }
        (!chunk.content.is_empty()).then(|| SseEvent::Message(chunk.content.clone()))
    }

    /// For failures returned before the stream opened.
    pub fn from_error(err: &ChatError) -> Self {
        SseEvent::Error(err.to_string())
    }

    pub fn name(&self) -> &'static str {
        match self {
            SseEvent::Message(_) => "message",
            SseEvent::Done => "done",
            SseEvent::Error(_) => "error",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            SseEvent::Message(text) | SseEvent::Error(text) => text,
            SseEvent::Done => "",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SseEvent::Message(_))
    }
}

impl fmt::Display for SseEvent {
    /// Wire form. A newline inside the data would end the field early, so
    /// every line gets its own `data:` prefix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "event: {}", self.name())?;
        for line in self.data().split('\n') {
            writeln!(f, "data: {line}")?;
        }
        writeln!(f)
    }
}
