//! The consolidation call that turns carried notes into one answer.

use tracing::{debug, warn};

use sift_core::Chunk;

use crate::carried::CarriedContext;
use crate::error::EngineError;
use crate::invoke::Invoker;
use crate::prompts::synthesis_prompt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Synthesis {
    pub answer: String,
    /// The consolidation call failed and `answer` is assembled from notes.
    pub degraded: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Synthesizer;

impl Synthesizer {
    pub async fn synthesize(
        &self,
        invoker: &mut Invoker,
        context: &CarriedContext,
        final_chunk: Option<&Chunk>,
        final_partial: Option<&str>,
        task: &str,
    ) -> Result<Synthesis, EngineError> {
        let Some(final_chunk) = final_chunk else {
            return degraded(invoker, context, final_partial, None);
        };

        let prompt = synthesis_prompt(task, &context.summary(), &final_chunk.text, final_partial);
        match invoker.call(prompt).await {
            Ok(answer) => {
                debug!(answer_chars = answer.chars().count(), "synthesis complete");
                Ok(Synthesis {
                    answer: answer.trim().to_string(),
                    degraded: false,
                })
            }
            Err(error) => {
                warn!(
                    error_kind = error.error_kind(),
                    error = %error,
                    "synthesis failed, returning carried notes"
                );
                degraded(invoker, context, final_partial, Some(error))
            }
        }
    }
}

/// The best answer available without the consolidation call: carried notes
/// followed by the final part's own response.
fn degraded(
    invoker: &Invoker,
    context: &CarriedContext,
    final_partial: Option<&str>,
    error: Option<sift_core::InferenceError>,
) -> Result<Synthesis, EngineError> {
    let mut blocks = Vec::new();
    if !context.is_empty() {
        blocks.push(context.summary());
    }
    if let Some(partial) = final_partial.filter(|p| !p.trim().is_empty()) {
        blocks.push(partial.trim().to_string());
    }

    if blocks.is_empty() {
        return Err(EngineError::InferenceUnavailable {
            provider: invoker.provider_name().to_string(),
            attempts: invoker.calls(),
            source: error,
        });
    }
    Ok(Synthesis {
        answer: blocks.join("\n\n"),
        degraded: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use sift_core::{BoundaryKind, GenerateOptions, InferenceError};
    use sift_llm::{MockProvider, MockResponse};

    fn invoker(provider: MockProvider) -> (Arc<MockProvider>, Invoker) {
        let provider = Arc::new(provider);
        let invoker = Invoker::new(
            provider.clone(),
            GenerateOptions::default(),
            Duration::from_secs(30),
            None,
        );
        (provider, invoker)
    }

    fn last_chunk() -> Chunk {
        Chunk {
            index: 2,
            text: "tail text".into(),
            boundary: BoundaryKind::Paragraph,
            is_final: true,
        }
    }

    #[tokio::test]
    async fn success_returns_trimmed_answer() {
        let (provider, mut inv) = invoker(MockProvider::always("  the answer \n"));
        let context = CarriedContext::new().fold(0, 3, "note a");

        let out = Synthesizer
            .synthesize(&mut inv, &context, Some(&last_chunk()), Some("partial"), "task")
            .await
            .unwrap();

        assert_eq!(out.answer, "the answer");
        assert!(!out.degraded);
        let prompt = &provider.prompts()[0].user;
        assert!(prompt.contains("note a"));
        assert!(prompt.contains("tail text"));
        assert!(prompt.contains("partial"));
    }

    #[tokio::test]
    async fn failure_degrades_to_notes_and_partial() {
        let (_, mut inv) = invoker(MockProvider::new(vec![MockResponse::Error(
            InferenceError::ProviderOverloaded,
        )]));
        let context = CarriedContext::new().fold(0, 3, "note a");

        let out = Synthesizer
            .synthesize(&mut inv, &context, Some(&last_chunk()), Some("partial"), "task")
            .await
            .unwrap();

        assert!(out.degraded);
        assert_eq!(out.answer, "[part 1 of 3]\nnote a\n\npartial");
    }

    #[tokio::test]
    async fn nothing_to_fall_back_on_is_unavailable() {
        let (_, mut inv) = invoker(MockProvider::new(vec![MockResponse::Error(
            InferenceError::NetworkError("refused".into()),
        )]));

        let err = Synthesizer
            .synthesize(&mut inv, &CarriedContext::new(), Some(&last_chunk()), None, "task")
            .await
            .unwrap_err();

        match err {
            EngineError::InferenceUnavailable {
                provider,
                attempts,
                source,
            } => {
                assert_eq!(provider, "mock");
                assert_eq!(attempts, 1);
                assert!(matches!(source, Some(InferenceError::NetworkError(_))));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
