use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use serde::Deserialize;

use sift_core::errors::InferenceError;
use sift_core::stream::StreamEvent;

/// One line of Ollama's streaming `/api/generate` response.
#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Turns NDJSON lines into [`StreamEvent`]s, accumulating the full text.
#[derive(Debug, Default)]
pub struct NdjsonParser {
    text: String,
    started: bool,
    finished: bool,
    eval_count: Option<u64>,
}

impl NdjsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one line. Blank lines yield nothing.
    pub fn parse_line(&mut self, line: &str) -> Vec<StreamEvent> {
        let line = line.trim();
        if line.is_empty() || self.finished {
            return Vec::new();
        }

        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(StreamEvent::Start);
        }

        let parsed: GenerateLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.finished = true;
                events.push(StreamEvent::Error {
                    error: InferenceError::StreamInterrupted(format!("malformed line: {e}")),
                });
                return events;
            }
        };

        if let Some(message) = parsed.error {
            self.finished = true;
            events.push(StreamEvent::Error {
                error: classify_stream_error(message),
            });
            return events;
        }

        if !parsed.response.is_empty() {
            self.text.push_str(&parsed.response);
            events.push(StreamEvent::TextDelta {
                delta: parsed.response,
            });
        }

        if parsed.done {
            self.finished = true;
            self.eval_count = parsed.eval_count;
            events.push(StreamEvent::Done {
                text: self.text.clone(),
            });
        }

        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Tokens generated, as reported on the final line.
    pub fn eval_count(&self) -> Option<u64> {
        self.eval_count
    }
}

fn classify_stream_error(message: String) -> InferenceError {
    let lower = message.to_lowercase();
    if lower.contains("not found") {
        InferenceError::ModelNotFound(message)
    } else {
        InferenceError::StreamInterrupted(message)
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Wraps a reqwest byte stream and yields StreamEvents.
///
/// Lines are split on raw bytes so multi-byte characters straddling a network
/// chunk are decoded intact. If no data arrives within the idle timeout the
/// stream yields an error and ends.
pub struct NdjsonStream {
    inner: ByteStream,
    parser: NdjsonParser,
    buffer: Vec<u8>,
    pending: Vec<StreamEvent>,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
    closed: bool,
}

impl NdjsonStream {
    pub fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            parser: NdjsonParser::new(),
            buffer: Vec::new(),
            pending: Vec::new(),
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
            closed: false,
        }
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let events = self.parser.parse_line(&line);
            self.pending.extend(events);
        }
    }

    fn next_pending(&mut self) -> Option<StreamEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let event = self.pending.remove(0);
        if event.is_terminal() {
            self.closed = true;
            self.pending.clear();
        }
        Some(event)
    }
}

impl Stream for NdjsonStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(event) = self.next_pending() {
            return Poll::Ready(Some(event));
        }
        if self.closed {
            return Poll::Ready(None);
        }

        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let deadline = tokio::time::Instant::now() + self.idle_duration;
                    self.idle_deadline.as_mut().reset(deadline);

                    self.buffer.extend_from_slice(&bytes);
                    self.drain_lines();
                    if let Some(event) = self.next_pending() {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.closed = true;
                    return Poll::Ready(Some(StreamEvent::Error {
                        error: InferenceError::StreamInterrupted(e.to_string()),
                    }));
                }
                Poll::Ready(None) => {
                    self.closed = true;
                    if !self.buffer.is_empty() {
                        let rest = std::mem::take(&mut self.buffer);
                        let line = String::from_utf8_lossy(&rest).into_owned();
                        let events = self.parser.parse_line(&line);
                        self.pending.extend(events);
                    }
                    if !self.parser.is_finished() && self.pending.is_empty() {
                        return Poll::Ready(Some(StreamEvent::Error {
                            error: InferenceError::StreamInterrupted(
                                "stream ended before done".into(),
                            ),
                        }));
                    }
                    return Poll::Ready(self.next_pending());
                }
                Poll::Pending => {
                    if self.idle_deadline.as_mut().poll(cx).is_ready() {
                        self.closed = true;
                        return Poll::Ready(Some(StreamEvent::Error {
                            error: InferenceError::StreamInterrupted(format!(
                                "idle timeout after {}s",
                                self.idle_duration.as_secs()
                            )),
                        }));
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
