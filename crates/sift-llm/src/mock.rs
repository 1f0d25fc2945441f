use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;

use sift_core::errors::InferenceError;
use sift_core::prompt::Prompt;
use sift_core::provider::{GenerateOptions, LlmProvider};
use sift_core::stream::{EventStream, StreamEvent};

/// Pre-programmed responses for deterministic testing without a model.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Yield a sequence of StreamEvents.
    Stream(Vec<StreamEvent>),
    /// Return an error from the stream() call itself.
    Error(InferenceError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// A complete text response: Start, one delta, Done.
    pub fn text(text: &str) -> Self {
        Self::Stream(vec![
            StreamEvent::Start,
            StreamEvent::TextDelta {
                delta: text.to_string(),
            },
            StreamEvent::Done {
                text: text.to_string(),
            },
        ])
    }

    /// A response delivered as several deltas with no `Done` text.
    pub fn deltas(parts: &[&str]) -> Self {
        let mut events = vec![StreamEvent::Start];
        events.extend(parts.iter().map(|p| StreamEvent::TextDelta {
            delta: (*p).to_string(),
        }));
        Self::Stream(events)
    }

    /// A stream that starts and then fails.
    pub fn stream_error(error: InferenceError) -> Self {
        Self::Stream(vec![StreamEvent::Start, StreamEvent::Error { error }])
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

type Handler = Box<dyn Fn(&Prompt, usize) -> MockResponse + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<MockResponse>>),
    Handler(Handler),
}

/// Mock provider that answers from a queue or a prompt-driven handler and
/// records every prompt it receives.
pub struct MockProvider {
    script: Script,
    prompts: Mutex<Vec<Prompt>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    /// Answer calls in order; calls past the end fail with `InvalidRequest`.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(responses.into())),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Answer each call by inspecting the prompt and the zero-based call index.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Prompt, usize) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            script: Script::Handler(Box::new(handler)),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Echo a fixed reply to every call.
    pub fn always(text: &str) -> Self {
        let text = text.to_string();
        Self::with_handler(move |_, _| MockResponse::text(&text))
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }

    fn next_response(&self, prompt: &Prompt, idx: usize) -> Result<MockResponse, InferenceError> {
        match &self.script {
            Script::Queue(queue) => queue.lock().pop_front().ok_or_else(|| {
                InferenceError::InvalidRequest(format!(
                    "MockProvider: no response configured for call {idx}"
                ))
            }),
            Script::Handler(handler) => Ok(handler(prompt, idx)),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream(
        &self,
        prompt: &Prompt,
        _options: &GenerateOptions,
    ) -> Result<EventStream, InferenceError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.prompts.lock().push(prompt.clone());
        let response = self.next_response(prompt, idx)?;
        resolve_response(response).await
    }
}

/// Resolve a MockResponse, sleeping through any nested delays.
async fn resolve_response(mut current: MockResponse) -> Result<EventStream, InferenceError> {
    loop {
        match current {
            MockResponse::Stream(events) => return Ok(Box::pin(stream::iter(events))),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}
