//! Server-Sent-Events reader for `streamGenerateContent?alt=sse`.
//!
//! Turns a byte stream into a lazy, single-pass sequence of text fragments.
//! Only `data:` lines carry content; everything else (blank separators,
//! `event:`/`id:` fields, `:` keep-alive comments) is ignored.

use crate::wire::GenerateContentResponse;
use futures::{Stream, StreamExt};
use gchat_core::{GchatError, Result};

const DONE_SENTINEL: &str = "[DONE]";

/// Where a reader is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Reading,
    Done,
    Errored,
}

enum LineOutcome {
    Skip,
    Fragment(String),
    Finished,
    Failed(GchatError),
}

/// Demultiplexes SSE frames from `inner` into text fragments.
///
/// Fragments come out strictly in arrival order. Once the reader reaches
/// `Done` or `Errored` it yields nothing more.
pub struct SseStreamReader<S> {
    inner: S,
    buffer: Vec<u8>,
    state: StreamState,
    eof: bool,
    yielded: usize,
    skipped_chunks: usize,
}

impl<S, B, E> SseStreamReader<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            state: StreamState::Reading,
            eof: false,
            yielded: 0,
            skipped_chunks: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of `data:` payloads dropped because they were not valid JSON.
    pub fn skipped_chunks(&self) -> usize {
        self.skipped_chunks
    }

    /// Reads until the next text fragment, the end of the stream, or an error.
    ///
    /// Returns `None` once the stream is finished. Network bytes are only
    /// pulled when no complete line is buffered.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        loop {
            if self.state != StreamState::Reading {
                return None;
            }

            if let Some(line) = self.take_line() {
                match self.handle_line(&line) {
                    LineOutcome::Skip => continue,
                    LineOutcome::Fragment(text) => {
                        self.yielded += 1;
                        return Some(Ok(text));
                    }
                    LineOutcome::Finished => {
                        self.state = StreamState::Done;
                        return None;
                    }
                    LineOutcome::Failed(err) => {
                        self.state = StreamState::Errored;
                        return Some(Err(err));
                    }
                }
            }

            if self.eof {
                return self.finish_at_eof();
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    self.state = StreamState::Errored;
                    return Some(Err(GchatError::transport(format!(
                        "response stream interrupted: {e}"
                    ))));
                }
                None => self.eof = true,
            }
        }
    }

    /// Adapts the reader into a `Stream` of fragments.
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> {
        futures::stream::unfold(self, |mut reader| async move {
            reader.next_fragment().await.map(|item| (item, reader))
        })
    }

    /// Pops one complete line, or the unterminated remainder at end of body.
    fn take_line(&mut self) -> Option<String> {
        let line_bytes = match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                line
            }
            None if self.eof && !self.buffer.is_empty() => std::mem::take(&mut self.buffer),
            None => return None,
        };

        let mut line = String::from_utf8_lossy(&line_bytes).into_owned();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    fn handle_line(&mut self, line: &str) -> LineOutcome {
        let Some(payload) = line.strip_prefix("data:") else {
            return LineOutcome::Skip;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();
        if payload.is_empty() {
            return LineOutcome::Skip;
        }
        if payload == DONE_SENTINEL {
            return LineOutcome::Finished;
        }

        let chunk: GenerateContentResponse = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.skipped_chunks += 1;
                tracing::warn!(error = %e, payload_len = payload.len(), "skipping malformed SSE chunk");
                return LineOutcome::Skip;
            }
        };

        if let Some(error) = &chunk.error {
            return LineOutcome::Failed(GchatError::api(error.code, error.describe()));
        }

        let text = chunk.first_text().filter(|t| !t.is_empty()).map(str::to_string);
        if let Some(reason) = chunk.finish_reason() {
            tracing::debug!(finish_reason = reason, "stream finished");
            self.state = StreamState::Done;
        }

        match text {
            Some(text) => LineOutcome::Fragment(text),
            None if self.state == StreamState::Done => LineOutcome::Finished,
            None => LineOutcome::Skip,
        }
    }

    /// The body ended without `[DONE]` or a finish reason.
    fn finish_at_eof(&mut self) -> Option<Result<String>> {
        if self.yielded > 0 {
            tracing::debug!(fragments = self.yielded, "stream closed without finish signal");
            self.state = StreamState::Done;
            None
        } else {
            self.state = StreamState::Errored;
            Some(Err(GchatError::transport(
                "connection closed before any content was received",
            )))
        }
    }
}
