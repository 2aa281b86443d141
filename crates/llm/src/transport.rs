//! Shared HTTP plumbing for streaming vendor transports.

use std::collections::VecDeque;

use futures::stream::{self, StreamExt};
use reqwest::header::RETRY_AFTER;
use reqwest::RequestBuilder;
use tracing::{debug, warn};

use acacia_tool_runtime::{LlmError, ProviderEvent, ProviderStream};

use crate::sse::{frame_stream, FrameStream, SseFrame};

/// Vendor-specific mapping from SSE frames to provider events.
pub(crate) trait FrameTranslator: Send + 'static {
    fn translate(&mut self, frame: &SseFrame) -> Result<Vec<ProviderEvent>, LlmError>;

    /// True once the vendor has signalled the end of the round.
    fn is_finished(&self) -> bool;
}

/// Send a streaming request and return its body as SSE frames.
/// Non-success statuses are classified before any byte is streamed.
pub(crate) async fn open_stream(request: RequestBuilder) -> Result<FrameStream, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "vendor rejected streaming request");
        return Err(LlmError::from_status(status.as_u16(), body, retry_after));
    }

    debug!(status = status.as_u16(), "vendor stream opened");
    Ok(frame_stream(response.bytes_stream()))
}

/// Run frames through a translator until the vendor finishes the round, the
/// body ends, or an error occurs. Errors end the stream.
pub(crate) fn translate_frames<T: FrameTranslator>(frames: FrameStream, translator: T) -> ProviderStream {
    struct State<T> {
        frames: FrameStream,
        translator: T,
        pending: VecDeque<ProviderEvent>,
        done: bool,
    }

    let state = State {
        frames,
        translator,
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }
            match state.frames.next().await {
                Some(Ok(frame)) => match state.translator.translate(&frame) {
                    Ok(events) => {
                        state.pending.extend(events);
                        state.done = state.translator.is_finished();
                    }
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                },
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => return None,
            }
        }
    }))
}
