//! Newline-delimited event frame decoding for streamed completions.
//!
//! Upstream sends `data: {json}` lines terminated by a `data: [DONE]`
//! sentinel. Reads may split a frame anywhere, so [`FrameDecoder`] keeps the
//! trailing partial line between calls and only interprets complete lines.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::time::Instant;

use crate::error::LlmError;
use crate::provider::ChatStream;

/// Prefix carried by event frames.
pub const EVENT_PREFIX: &str = "data:";
/// Terminal frame payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Interpretation of one complete upstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text to forward to the caller.
    Text(String),
    /// Terminal sentinel.
    Done,
    /// Blank keep-alive line, or valid JSON without text.
    Empty,
    /// Line that is neither the sentinel nor valid JSON.
    Malformed(String),
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: Option<String>,
}

/// Classify a single line (without its trailing newline).
#[must_use]
pub fn parse_frame(line: &str) -> Frame {
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix(EVENT_PREFIX).unwrap_or(line).trim();

    if payload.is_empty() {
        return Frame::Empty;
    }
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(StreamChunk {
            response: Some(text),
        }) if !text.is_empty() => Frame::Text(text),
        Ok(_) => Frame::Empty,
        Err(e) => Frame::Malformed(format!("{e}: {payload}")),
    }
}

/// Incremental line splitter over raw response bytes.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carryover: Vec<u8>,
    // prefix of `carryover` already known to hold no newline
    scanned: usize,
    malformed: usize,
    done: bool,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the text of every complete line it finished.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carryover.extend_from_slice(chunk);
        let buf = std::mem::take(&mut self.carryover);

        let mut out = Vec::new();
        let mut start = 0;
        let mut scan = self.scanned;
        while let Some(offset) = buf[scan..].iter().position(|b| *b == b'\n') {
            let end = scan + offset;
            self.handle_line(&buf[start..end], &mut out);
            start = end + 1;
            scan = start;
        }

        self.carryover = buf;
        self.carryover.drain(..start);
        self.scanned = self.carryover.len();
        out
    }

    /// Flush the residual partial line once upstream has closed.
    pub fn finish(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.carryover.is_empty() {
            let line = std::mem::take(&mut self.carryover);
            self.scanned = 0;
            self.handle_line(&line, &mut out);
        }
        out
    }

    /// Number of lines dropped because they failed to parse.
    #[must_use]
    pub fn malformed_frames(&self) -> usize {
        self.malformed
    }

    /// Whether the upstream sentinel has been seen.
    #[must_use]
    pub fn saw_done(&self) -> bool {
        self.done
    }

    /// Bytes buffered waiting for a newline.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.carryover.len()
    }

    fn handle_line(&mut self, raw: &[u8], out: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        match parse_frame(&line) {
            Frame::Text(text) => out.push(text),
            Frame::Done => self.done = true,
            Frame::Empty => {}
            Frame::Malformed(reason) => {
                self.malformed += 1;
                tracing::warn!("dropping malformed stream frame: {reason}");
            }
        }
    }
}

struct DecodeState<S> {
    body: S,
    decoder: FrameDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn a raw byte stream into a [`ChatStream`] of text fragments.
///
/// A transport error is yielded once and ends the stream.
pub fn decode_frames<S, B, E>(body: S) -> ChatStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let state = DecodeState {
        body,
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let texts = st.decoder.feed(chunk.as_ref());
                    st.pending.extend(texts);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(LlmError::StreamRead(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    let texts = st.decoder.finish();
                    st.pending.extend(texts);
                }
            }
        }
    }))
}

/// Bound a stream by an absolute deadline.
///
/// When the deadline passes before the inner stream ends, a single
/// [`LlmError::Timeout`] is yielded and the stream closes.
#[must_use]
pub fn with_deadline(stream: ChatStream, deadline: Instant, limit: Duration) -> ChatStream {
    Box::pin(futures::stream::unfold(
        Some(stream),
        move |state| async move {
            let mut inner = state?;
            match tokio::time::timeout_at(deadline, inner.next()).await {
                Ok(Some(item)) => Some((item, Some(inner))),
                Ok(None) => None,
                Err(_) => Some((Err(LlmError::Timeout(limit)), None)),
            }
        },
    ))
}
