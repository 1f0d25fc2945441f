use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use sift_core::errors::InferenceError;
use sift_core::prompt::Prompt;
use sift_core::provider::{GenerateOptions, LlmProvider};
use sift_core::stream::{EventStream, StreamEvent};

/// Retry and circuit breaker behavior for [`ReliableProvider`].
#[derive(Clone, Debug)]
pub struct ReliableConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay randomly added or removed.
    pub jitter_factor: f64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.2,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

/// N consecutive failures → open → cooldown → half-open → success → closed.
struct CircuitBreaker {
    state: RwLock<CircuitState>,
    consecutive_failures: AtomicU32,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicU32::new(0),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    fn allow(&self) -> Result<(), InferenceError> {
        let current = *self.state.read();
        match current {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { since } if since.elapsed() >= self.cooldown => {
                *self.state.write() = CircuitState::HalfOpen;
                info!("circuit breaker half-open, letting one request through");
                Ok(())
            }
            CircuitState::Open { .. } => Err(InferenceError::ProviderOverloaded),
        }
    }

    fn on_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.state.write();
        if *state != CircuitState::Closed {
            info!("circuit breaker closed after successful request");
            *state = CircuitState::Closed;
        }
    }

    fn on_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.state.write();
        let reopen = *state == CircuitState::HalfOpen;
        if (failures >= self.threshold && *state == CircuitState::Closed) || reopen {
            warn!(
                failures,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker opened"
            );
            *state = CircuitState::Open {
                since: Instant::now(),
            };
        }
    }

    fn state_name(&self) -> &'static str {
        match *self.state.read() {
            CircuitState::Closed => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Wraps an [`LlmProvider`] with retry logic and a circuit breaker.
///
/// - Retryable errors are retried with exponential backoff and jitter
/// - `retry_after` hints from rate limiting take precedence over backoff
/// - A stream whose first event is a retryable error counts as a failed
///   attempt; once any text has arrived the stream is committed and passed
///   through untouched
pub struct ReliableProvider<P: LlmProvider> {
    inner: P,
    config: ReliableConfig,
    breaker: CircuitBreaker,
    total_retries: AtomicU64,
}

impl<P: LlmProvider> ReliableProvider<P> {
    pub fn new(inner: P, config: ReliableConfig) -> Self {
        let breaker =
            CircuitBreaker::new(config.circuit_breaker_threshold, config.circuit_breaker_cooldown);
        Self {
            inner,
            config,
            breaker,
            total_retries: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: P) -> Self {
        Self::new(inner, ReliableConfig::default())
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }

    pub fn circuit_state_name(&self) -> &'static str {
        self.breaker.state_name()
    }

    /// Exponential backoff (`base * 2^attempt`, capped) with jitter.
    fn retry_delay(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(delay) = suggested {
            return delay;
        }
        let base_ms = self.config.base_delay.as_millis() as f64;
        let capped = (base_ms * 2.0_f64.powi(attempt.min(30) as i32))
            .min(self.config.max_delay.as_millis() as f64);
        let jitter = capped * self.config.jitter_factor * jitter_unit();
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    /// One attempt: open the stream and wait for its first meaningful event.
    async fn attempt(
        &self,
        prompt: &Prompt,
        options: &GenerateOptions,
    ) -> Result<EventStream, InferenceError> {
        let mut inner = self.inner.stream(prompt, options).await?;
        let mut prefix = Vec::new();

        while let Some(event) = inner.next().await {
            match event {
                StreamEvent::Start => prefix.push(event),
                StreamEvent::Error { error } => return Err(error),
                other => {
                    prefix.push(other);
                    break;
                }
            }
        }

        Ok(Box::pin(stream::iter(prefix).chain(inner)))
    }
}

/// A value in [-1.0, 1.0] derived from the clock's sub-second nanos.
fn jitter_unit() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    f64::from(nanos % 2001) / 1000.0 - 1.0
}

#[async_trait]
impl<P: LlmProvider> LlmProvider for ReliableProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn stream(
        &self,
        prompt: &Prompt,
        options: &GenerateOptions,
    ) -> Result<EventStream, InferenceError> {
        self.breaker.allow()?;

        let mut attempt = 0;
        loop {
            match self.attempt(prompt, options).await {
                Ok(stream) => {
                    self.breaker.on_success();
                    return Ok(stream);
                }
                Err(e) => {
                    let exhausted = attempt >= self.config.max_retries;
                    if exhausted || !e.is_retryable() {
                        self.breaker.on_failure();
                        return Err(e);
                    }

                    let delay = self.retry_delay(attempt, e.suggested_delay());
                    self.total_retries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        provider = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    self.breaker.allow()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockResponse};
    use sift_core::stream::collect_text;

    fn server_error() -> MockResponse {
        MockResponse::Error(InferenceError::ServerError {
            status: 500,
            body: "internal".into(),
        })
    }

    fn fast(max_retries: u32) -> ReliableConfig {
        ReliableConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            ..Default::default()
        }
    }

    async fn call<P: LlmProvider>(p: &ReliableProvider<P>) -> Result<String, InferenceError> {
        let stream = p
            .stream(&Prompt::user("q"), &GenerateOptions::default())
            .await?;
        collect_text(stream).await
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_try() {
        let reliable = ReliableProvider::with_defaults(MockProvider::new(vec![MockResponse::text(
            "hello",
        )]));
        assert_eq!(call(&reliable).await.unwrap(), "hello");
        assert_eq!(reliable.total_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_on_retryable_error() {
        let mock = MockProvider::new(vec![
            server_error(),
            server_error(),
            MockResponse::text("recovered"),
        ]);
        let reliable = ReliableProvider::new(mock, fast(3));
        assert_eq!(call(&reliable).await.unwrap(), "recovered");
        assert_eq!(reliable.total_retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn error_as_first_stream_event_is_retried() {
        let mock = MockProvider::new(vec![
            MockResponse::stream_error(InferenceError::StreamInterrupted("reset".into())),
            MockResponse::text("second try"),
        ]);
        let reliable = ReliableProvider::new(mock, fast(2));
        assert_eq!(call(&reliable).await.unwrap(), "second try");
        assert_eq!(reliable.total_retries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn committed_stream_is_not_retried() {
        let mock = MockProvider::new(vec![
            MockResponse::Stream(vec![
                StreamEvent::Start,
                StreamEvent::TextDelta { delta: "par".into() },
                StreamEvent::Error {
                    error: InferenceError::StreamInterrupted("reset".into()),
                },
            ]),
            MockResponse::text("unreachable"),
        ]);
        let reliable = ReliableProvider::new(mock, fast(2));
        let err = call(&reliable).await.unwrap_err();
        assert!(matches!(err, InferenceError::StreamInterrupted(_)));
        assert_eq!(reliable.total_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_not_retried() {
        let mock = MockProvider::new(vec![
            MockResponse::Error(InferenceError::ModelNotFound("llama9".into())),
            MockResponse::text("should not reach"),
        ]);
        let reliable = ReliableProvider::with_defaults(mock);
        let err = call(&reliable).await.unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotFound(_)));
        assert_eq!(reliable.total_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn max_retries_exhausted() {
        let mock = MockProvider::new(vec![server_error(), server_error(), server_error()]);
        let reliable = ReliableProvider::new(mock, fast(2));
        assert!(call(&reliable).await.is_err());
        assert_eq!(reliable.total_retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn circuit_breaker_trips_and_recovers() {
        let mock = MockProvider::new(vec![
            server_error(),
            server_error(),
            server_error(),
            MockResponse::text("recovered"),
        ]);
        let config = ReliableConfig {
            max_retries: 0,
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown: Duration::from_secs(30),
            ..fast(0)
        };
        let reliable = ReliableProvider::new(mock, config);

        for _ in 0..3 {
            let _ = call(&reliable).await;
        }
        assert_eq!(reliable.circuit_state_name(), "open");

        let rejected = call(&reliable).await.unwrap_err();
        assert!(matches!(rejected, InferenceError::ProviderOverloaded));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(call(&reliable).await.unwrap(), "recovered");
        assert_eq!(reliable.circuit_state_name(), "closed");
    }

    #[test]
    fn retry_delay_respects_suggested() {
        let reliable = ReliableProvider::with_defaults(MockProvider::new(vec![]));
        let delay = reliable.retry_delay(0, Some(Duration::from_secs(5)));
        assert_eq!(delay, Duration::from_secs(5));
    }

    #[test]
    fn retry_delay_exponential_and_capped() {
        let config = ReliableConfig {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter_factor: 0.0,
            ..Default::default()
        };
        let reliable = ReliableProvider::new(MockProvider::new(vec![]), config);
        assert_eq!(reliable.retry_delay(0, None).as_millis(), 100);
        assert_eq!(reliable.retry_delay(1, None).as_millis(), 200);
        assert_eq!(reliable.retry_delay(2, None).as_millis(), 400);
        assert_eq!(reliable.retry_delay(10, None).as_millis(), 1000);
    }

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..100 {
            let j = jitter_unit();
            assert!((-1.0..=1.0).contains(&j));
        }
    }

    #[test]
    fn provider_delegates_properties() {
        let reliable = ReliableProvider::with_defaults(MockProvider::new(vec![]));
        assert_eq!(reliable.name(), "mock");
        assert_eq!(reliable.model(), "mock-model");
    }
}
