//! Chunk stream decoder: turns a streamed response body into text fragments.
//!
//! Wire format: the backend writes one JSON object `{"chunk": "..."}` per unit but
//! leaves raw newline bytes inside the string payload unescaped. Decoding is:
//! bytes → text (stateful UTF-8) → frame one top-level object → escape raw
//! newlines inside string literals → parse → `chunk`.
//!
//! A unit split across several transport chunks and several units sharing one
//! chunk are both framed correctly. Anything that does not parse is a protocol
//! violation and terminates the stream after the fragments that preceded it.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::errors::ClientError;
use crate::stream::utf8::Utf8Decoder;

/// Lazy, finite, single-pass sequence of decoded fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// One decoded unit of server-sent text.
#[derive(Debug, Clone, Deserialize)]
pub struct Fragment {
    pub chunk: String,
}

/// Longest slice of offending input quoted back in an `UnframedData` error.
const UNFRAMED_PREVIEW_CHARS: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Framing
// ────────────────────────────────────────────────────────────────────────────

/// Incremental framer for the `{chunk}` wire format.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    unit: String,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk; completed fragments are appended to `out` in order.
    pub fn push(&mut self, bytes: &[u8], out: &mut VecDeque<String>) -> Result<(), ClientError> {
        let text = self.utf8.decode(bytes);
        self.feed(&text, out)
    }

    /// Signals end of stream. Fails if a unit was left unterminated.
    pub fn finish(&mut self, out: &mut VecDeque<String>) -> Result<(), ClientError> {
        let tail = self.utf8.finish();
        self.feed(&tail, out)?;
        if self.depth > 0 || !self.unit.is_empty() {
            return Err(ClientError::TruncatedStream(std::mem::take(&mut self.unit)));
        }
        Ok(())
    }

    fn feed(&mut self, text: &str, out: &mut VecDeque<String>) -> Result<(), ClientError> {
        for (offset, c) in text.char_indices() {
            if self.depth == 0 {
                if c.is_whitespace() {
                    continue;
                }
                if c != '{' {
                    let preview: String =
                        text[offset..].chars().take(UNFRAMED_PREVIEW_CHARS).collect();
                    return Err(ClientError::UnframedData(preview));
                }
                self.depth = 1;
                self.unit.push(c);
                continue;
            }

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                    self.unit.push(c);
                } else {
                    match c {
                        '\\' => {
                            self.escaped = true;
                            self.unit.push(c);
                        }
                        '"' => {
                            self.in_string = false;
                            self.unit.push(c);
                        }
                        '\n' => self.unit.push_str("\\n"),
                        '\r' => self.unit.push_str("\\r"),
                        _ => self.unit.push(c),
                    }
                }
                continue;
            }

            self.unit.push(c);
            match c {
                '"' => self.in_string = true,
                '{' | '[' => self.depth += 1,
                '}' | ']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        out.push_back(self.complete_unit()?);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn complete_unit(&mut self) -> Result<String, ClientError> {
        let unit = std::mem::take(&mut self.unit);
        match serde_json::from_str::<Fragment>(&unit) {
            Ok(fragment) => Ok(fragment.chunk),
            Err(source) => Err(ClientError::Protocol { unit, source }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stream adapter
// ────────────────────────────────────────────────────────────────────────────

struct DecodeState<S> {
    body: Pin<Box<S>>,
    frames: FrameDecoder,
    ready: VecDeque<String>,
    error: Option<ClientError>,
    done: bool,
}

/// Wraps a byte stream into a [`FragmentStream`]. Fragments are yielded in arrival
/// order; the first error (transport or protocol) is yielded last and ends the stream.
pub fn decode_fragments<S>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        frames: FrameDecoder::new(),
        ready: VecDeque::new(),
        error: None,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }
            if let Some(err) = state.error.take() {
                return Some((Err(err), state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    debug!("Received {} stream bytes", bytes.len());
                    if let Err(e) = state.frames.push(&bytes, &mut state.ready) {
                        state.error = Some(e);
                        state.done = true;
                    }
                }
                Some(Err(e)) => {
                    state.error = Some(e);
                    state.done = true;
                }
                None => {
                    if let Err(e) = state.frames.finish(&mut state.ready) {
                        state.error = Some(e);
                    }
                    state.done = true;
                }
            }
        }
    }))
}
