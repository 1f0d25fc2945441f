use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use sift_core::{collect_text, GenerateOptions, InferenceError, LlmProvider, Prompt};

/// One run's handle on the provider: applies the per-call timeout and the
/// shared system prompt, and counts invocations.
pub struct Invoker {
    provider: Arc<dyn LlmProvider>,
    options: GenerateOptions,
    timeout: Duration,
    system_prompt: Option<String>,
    calls: usize,
}

impl Invoker {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        options: GenerateOptions,
        timeout: Duration,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            provider,
            options,
            timeout,
            system_prompt,
            calls: 0,
        }
    }

    /// Invocations issued so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send `user` and wait for the complete response text.
    ///
    /// The timeout covers the whole exchange, from request to the last token.
    pub async fn call(&mut self, user: String) -> Result<String, InferenceError> {
        self.calls += 1;
        let prompt = match &self.system_prompt {
            Some(system) => Prompt::user(user).with_system(system.clone()),
            None => Prompt::user(user),
        };

        let started = Instant::now();
        let exchange = async {
            let stream = self.provider.stream(&prompt, &self.options).await?;
            collect_text(stream).await
        };
        let result = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.timeout)),
        };

        debug!(
            call = self.calls,
            prompt_chars = prompt.char_len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "model call finished"
        );
        result
    }
}
