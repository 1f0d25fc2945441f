use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::errors::InferenceError;

/// Events emitted while a model generates. Ordering contract:
///
/// Start → TextDelta* → Done
///
/// Error can appear at any point and ends the stream.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Start,
    TextDelta { delta: String },
    Done { text: String },
    Error { error: InferenceError },
}

/// Boxed event stream returned by providers.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Drain a stream into the complete response text.
///
/// `Done` carries the authoritative text; deltas are used when a provider
/// closes the stream without one. A blank response is `EmptyResponse`.
pub async fn collect_text(mut stream: EventStream) -> Result<String, InferenceError> {
    let mut buffer = String::new();
    let mut final_text = None;

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Start => {}
            StreamEvent::TextDelta { delta } => buffer.push_str(&delta),
            StreamEvent::Done { text } => {
                final_text = Some(text);
                break;
            }
            StreamEvent::Error { error } => return Err(error),
        }
    }

    let text = final_text.unwrap_or(buffer);
    if text.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn boxed(events: Vec<StreamEvent>) -> EventStream {
        Box::pin(stream::iter(events))
    }

    #[test]
    fn terminal_classification() {
        assert!(StreamEvent::Done { text: "hi".into() }.is_terminal());
        assert!(StreamEvent::Error { error: InferenceError::Cancelled }.is_terminal());
        assert!(!StreamEvent::TextDelta { delta: "x".into() }.is_terminal());
    }

    #[tokio::test]
    async fn done_text_wins_over_deltas() {
        let text = collect_text(boxed(vec![
            StreamEvent::Start,
            StreamEvent::TextDelta { delta: "par".into() },
            StreamEvent::Done { text: "full answer".into() },
        ]))
        .await
        .unwrap();
        assert_eq!(text, "full answer");
    }

    #[tokio::test]
    async fn deltas_used_when_stream_ends_without_done() {
        let text = collect_text(boxed(vec![
            StreamEvent::Start,
            StreamEvent::TextDelta { delta: "hello ".into() },
            StreamEvent::TextDelta { delta: "world".into() },
        ]))
        .await
        .unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn error_event_propagates() {
        let result = collect_text(boxed(vec![
            StreamEvent::Start,
            StreamEvent::Error {
                error: InferenceError::StreamInterrupted("eof".into()),
            },
        ]))
        .await;
        assert!(matches!(result, Err(InferenceError::StreamInterrupted(_))));
    }

    #[tokio::test]
    async fn blank_response_is_empty_error() {
        let result = collect_text(boxed(vec![StreamEvent::Done { text: "  \n".into() }])).await;
        assert!(matches!(result, Err(InferenceError::EmptyResponse)));
    }
}
