//! The `process_content` entry point.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn, Span};
use uuid::Uuid;

use sift_core::{ChunkStrategy, ContentHint, ContentItem, GenerateOptions, LlmProvider};

use crate::error::EngineError;
use crate::invoke::Invoker;
use crate::planner::{ChunkPlanner, Plan, PlannerConfig};
use crate::processor::{ProcessorConfig, SequentialProcessor};
use crate::prompts::{effective_task, single_shot_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::synthesizer::Synthesizer;

/// Everything a pipeline needs, passed explicitly.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub planner: PlannerConfig,
    pub processor: ProcessorConfig,
    /// `None` uses the built-in analysis prompt.
    pub system_prompt: Option<String>,
    pub generation: GenerateOptions,
}

/// Outcome of one `process_content` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkingResult {
    pub answer: String,
    /// Chunks sent to the model, failed ones included. 0 for empty content,
    /// 1 for the single-shot path.
    pub chunks_processed: usize,
    /// `None` unless the content was chunked.
    pub strategy: Option<ChunkStrategy>,
    pub degraded: bool,
    /// Indices of chunks whose invocation failed.
    pub failed_chunks: Vec<usize>,
    pub model_calls: usize,
    /// Correlates this result with the run's log events.
    pub run_id: Uuid,
}

/// Chunk-aware front end to a model provider. Cheap to share: concurrent
/// calls hold nothing in common but the provider.
pub struct ContentPipeline {
    provider: Arc<dyn LlmProvider>,
    planner: ChunkPlanner,
    processor: SequentialProcessor,
    synthesizer: Synthesizer,
    config: PipelineConfig,
}

impl ContentPipeline {
    pub fn new(provider: Arc<dyn LlmProvider>, config: PipelineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            provider,
            planner: ChunkPlanner::new(config.planner)?,
            processor: SequentialProcessor::new(config.processor)?,
            synthesizer: Synthesizer,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn invoker(&self) -> Invoker {
        let system = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        Invoker::new(
            Arc::clone(&self.provider),
            self.config.generation.clone(),
            self.config.processor.invoke_timeout,
            Some(system),
        )
    }

    /// Answer `task` over `content`, chunking it when it is too large for one
    /// call. Partial failures degrade the answer instead of failing the call.
    /// A blank `task` becomes [`DEFAULT_TASK`](crate::prompts::DEFAULT_TASK).
    #[instrument(
        skip_all,
        fields(
            run_id = tracing::field::Empty,
            chars = tracing::field::Empty,
            hint = %hint,
            disable_chunking = disable_chunking
        )
    )]
    pub async fn process_content(
        &self,
        task: &str,
        content: &str,
        hint: ContentHint,
        disable_chunking: bool,
    ) -> Result<ChunkingResult, EngineError> {
        let run_id = Uuid::now_v7();
        let task = effective_task(task);
        let item = ContentItem::new(content, hint);
        let span = Span::current();
        span.record("run_id", tracing::field::display(run_id));
        span.record("chars", item.len());

        let started = Instant::now();
        let mut invoker = self.invoker();

        let result = match self.planner.plan(&item, disable_chunking) {
            Plan::Empty => Ok(ChunkingResult {
                answer: String::new(),
                chunks_processed: 0,
                strategy: None,
                degraded: false,
                failed_chunks: Vec::new(),
                model_calls: 0,
                run_id,
            }),

            Plan::SingleShot => match invoker.call(single_shot_prompt(task, item.body())).await {
                Ok(answer) => Ok(ChunkingResult {
                    answer: answer.trim().to_string(),
                    chunks_processed: 1,
                    strategy: None,
                    degraded: false,
                    failed_chunks: Vec::new(),
                    model_calls: invoker.calls(),
                    run_id,
                }),
                Err(error) => {
                    warn!(error_kind = error.error_kind(), error = %error, "single-shot call failed");
                    Err(EngineError::InferenceUnavailable {
                        provider: invoker.provider_name().to_string(),
                        attempts: invoker.calls(),
                        source: Some(error),
                    })
                }
            },

            Plan::Chunked { strategy, chunks } => {
                let total = chunks.len();
                info!(strategy = %strategy, total_chunks = total, "chunking content");

                let processed = self.processor.process(&mut invoker, chunks, task).await;
                let synthesis = self
                    .synthesizer
                    .synthesize(
                        &mut invoker,
                        &processed.context,
                        processed.final_chunk.as_ref(),
                        processed.final_partial.as_deref(),
                        task,
                    )
                    .await?;

                let failed_chunks = processed.context.skipped().to_vec();
                if !failed_chunks.is_empty() {
                    warn!(
                        failed = failed_chunks.len(),
                        total_chunks = total,
                        "some chunks failed and were skipped"
                    );
                }
                Ok(ChunkingResult {
                    answer: synthesis.answer,
                    chunks_processed: total,
                    strategy: Some(strategy),
                    degraded: synthesis.degraded,
                    failed_chunks,
                    model_calls: invoker.calls(),
                    run_id,
                })
            }
        };

        if let Ok(r) = &result {
            info!(
                model_calls = r.model_calls,
                chunks = r.chunks_processed,
                degraded = r.degraded,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "content processed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_llm::MockProvider;

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            processor: ProcessorConfig {
                summary_budget: 0,
                ..ProcessorConfig::default()
            },
            ..PipelineConfig::default()
        };
        let result = ContentPipeline::new(Arc::new(MockProvider::always("x")), config);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn empty_content_makes_no_calls() {
        let provider = Arc::new(MockProvider::always("never"));
        let pipeline = ContentPipeline::new(provider.clone(), PipelineConfig::default()).unwrap();

        let result = pipeline
            .process_content("summarize", "", ContentHint::Unknown, false)
            .await
            .unwrap();

        assert_eq!(result.answer, "");
        assert_eq!(result.model_calls, 0);
        assert_eq!(result.chunks_processed, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn default_system_prompt_is_sent() {
        let provider = Arc::new(MockProvider::always("ok"));
        let pipeline = ContentPipeline::new(provider.clone(), PipelineConfig::default()).unwrap();
        pipeline
            .process_content("t", "small", ContentHint::Text, false)
            .await
            .unwrap();
        assert_eq!(
            provider.prompts()[0].system.as_deref(),
            Some(DEFAULT_SYSTEM_PROMPT)
        );
    }

    #[tokio::test]
    async fn blank_task_uses_default_extraction_task() {
        let provider = Arc::new(MockProvider::always("ok"));
        let pipeline = ContentPipeline::new(provider.clone(), PipelineConfig::default()).unwrap();
        pipeline
            .process_content("   ", "a small dump", ContentHint::Unknown, false)
            .await
            .unwrap();

        let user = &provider.prompts()[0].user;
        assert!(user.starts_with(&format!("Task: {}", crate::prompts::DEFAULT_TASK)));
    }

    #[test]
    fn result_serializes_with_snake_case_strategy() {
        let result = ChunkingResult {
            answer: "a".into(),
            chunks_processed: 3,
            strategy: Some(ChunkStrategy::StructuredData),
            degraded: false,
            failed_chunks: vec![1],
            model_calls: 4,
            run_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["strategy"], "structured_data");
        assert_eq!(json["failed_chunks"], serde_json::json!([1]));
    }
}
