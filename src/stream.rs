//! Converts a provider's server-sent-event byte stream into text deltas.
//!
//! Bytes are fed through [`SseLineBuffer`] as they arrive, so a frame split
//! across reads is reassembled and emitted once. When the source ends, the
//! buffered tail is flushed and parsed one last time. Nothing is buffered
//! beyond the current partial line.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

use folio_chat_core::sse::{parse_frame, SseLineBuffer};
use futures_util::{stream, Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::generation::TextStream;

struct DeltaState<S> {
    source: Pin<Box<S>>,
    lines: SseLineBuffer,
    ready: VecDeque<String>,
    done: bool,
    idle_timeout: Option<Duration>,
    model: String,
}

impl<S> DeltaState<S> {
    fn accept(&mut self, line: &str) {
        let Some(frame) = parse_frame(line) else {
            return;
        };
        if let Some(reason) = &frame.finish_reason {
            if reason.is_normal() {
                debug!(model = %self.model, "generation finished");
            } else {
                warn!(model = %self.model, ?reason, "generation stopped early");
            }
        }
        if let Some(text) = frame.text {
            self.ready.push_back(text);
        }
    }
}

/// Wrap a raw SSE byte stream as a [`TextStream`].
///
/// `idle_timeout` bounds the wait for each network read; when it elapses the
/// stream ends with [`ProviderError::Timeout`].
pub fn text_deltas<S, B, E>(source: S, model: &str, idle_timeout: Option<Duration>) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DeltaState {
        source: Box::pin(source),
        lines: SseLineBuffer::new(),
        ready: VecDeque::new(),
        done: false,
        idle_timeout,
        model: model.to_string(),
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.ready.pop_front() {
                return Some((Ok(text), st));
            }
            if st.done {
                return None;
            }

            let next = match st.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, st.source.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        st.done = true;
                        return Some((Err(ProviderError::Timeout), st));
                    }
                },
                None => st.source.next().await,
            };

            match next {
                Some(Ok(bytes)) => {
                    for line in st.lines.push(bytes.as_ref()) {
                        st.accept(&line);
                    }
                }
                Some(Err(err)) => {
                    st.done = true;
                    warn!(model = %st.model, error = %err, "generation stream read failed");
                    return Some((Err(ProviderError::Stream(err.to_string())), st));
                }
                None => {
                    st.done = true;
                    if let Some(rest) = st.lines.finish() {
                        st.accept(&rest);
                    }
                }
            }
        }
    }))
}
