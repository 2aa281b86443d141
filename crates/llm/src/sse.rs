//! Incremental server-sent-events decoding.
//!
//! Bytes are buffered until a full line is available, so frames and UTF-8
//! sequences split across network reads are reassembled before parsing.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use acacia_tool_runtime::LlmError;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the frame had one.
    pub event: Option<String>,
    /// All `data:` lines of the frame joined with `\n`.
    pub data: String,
}

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SseFrame, LlmError>> + Send>>;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every frame completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &raw[..raw.len() - 1];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let line = String::from_utf8_lossy(line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush at end of input: a trailing unterminated line and any frame
    /// still waiting for its blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

/// Decode a response body into SSE frames.
pub fn frame_stream<S, E>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    struct State<S> {
        bytes: Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<SseFrame>,
        ended: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        ended: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.ended {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(&chunk);
                    state.pending.extend(frames);
                }
                Some(Err(e)) => {
                    state.ended = true;
                    return Some((Err(LlmError::StreamError(e.to_string())), state));
                }
                None => {
                    state.ended = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    }))
}
