use async_trait::async_trait;

use crate::errors::InferenceError;
use crate::prompt::Prompt;
use crate::stream::EventStream;

/// Options controlling generation behavior.
#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub stop_sequences: Vec<String>,
}

/// Trait implemented by each inference backend.
///
/// Implementations are stateless from the caller's point of view and may be
/// shared across concurrent pipelines.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn stream(
        &self,
        prompt: &Prompt,
        options: &GenerateOptions,
    ) -> Result<EventStream, InferenceError>;
}
