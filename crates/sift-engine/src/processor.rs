//! Strictly ordered chunk-by-chunk invocation.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use sift_core::Chunk;

use crate::carried::CarriedContext;
use crate::error::EngineError;
use crate::invoke::Invoker;
use crate::prompts::{chunk_prompt, compaction_prompt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Applied to every model call.
    pub invoke_timeout: Duration,
    /// Carried summaries longer than this many characters are compacted.
    pub summary_budget: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            invoke_timeout: Duration::from_secs(30),
            summary_budget: 6_000,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.invoke_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "invoke_timeout must be greater than 0".into(),
            ));
        }
        if self.summary_budget == 0 {
            return Err(EngineError::InvalidConfig(
                "summary_budget must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// What the processor hands to the synthesizer.
#[derive(Debug)]
pub struct Processed {
    pub context: CarriedContext,
    /// The last chunk, kept for the consolidation call.
    pub final_chunk: Option<Chunk>,
    /// The model's response to the final chunk, when that call succeeded.
    pub final_partial: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SequentialProcessor {
    config: ProcessorConfig,
}

impl SequentialProcessor {
    pub fn new(config: ProcessorConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Invoke the model on each chunk in index order, threading the carried
    /// context through. A failed chunk is logged, recorded and skipped.
    pub async fn process(&self, invoker: &mut Invoker, chunks: Vec<Chunk>, task: &str) -> Processed {
        let total = chunks.len();
        let mut context = CarriedContext::new();
        let mut final_chunk = None;
        let mut final_partial = None;

        for chunk in chunks {
            let prompt = chunk_prompt(chunk.index, total, task, &context.summary(), &chunk.text);
            let started = Instant::now();

            match invoker.call(prompt).await {
                Ok(response) => {
                    debug!(
                        chunk_index = chunk.index,
                        total_chunks = total,
                        chars = chunk.char_len(),
                        response_chars = response.chars().count(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "chunk processed"
                    );
                    if chunk.is_final {
                        final_partial = Some(response.trim().to_string());
                    } else {
                        context = context.fold(chunk.index, total, &response);
                        context = self.compact_if_needed(invoker, context, task).await;
                    }
                }
                Err(error) => {
                    warn!(
                        chunk_index = chunk.index,
                        total_chunks = total,
                        error_kind = error.error_kind(),
                        error = %error,
                        "chunk invocation failed, continuing without it"
                    );
                    context = context.skip(chunk.index);
                }
            }

            if chunk.is_final {
                final_chunk = Some(chunk);
            }
        }

        Processed {
            context,
            final_chunk,
            final_partial,
        }
    }

    /// Bring the summary back under budget: one condensation call, then the
    /// deterministic trim if that call fails or does not shrink it enough.
    async fn compact_if_needed(
        &self,
        invoker: &mut Invoker,
        context: CarriedContext,
        task: &str,
    ) -> CarriedContext {
        let budget = self.config.summary_budget;
        let before = context.summary_len();
        if before <= budget {
            return context;
        }

        let prompt = compaction_prompt(task, &context.summary(), budget / 2);
        match invoker.call(prompt).await {
            Ok(condensed) => {
                let candidate = context.clone().condense(&condensed);
                let after = candidate.summary_len();
                if after <= budget && after < before {
                    debug!(before, after, "carried context condensed");
                    return candidate;
                }
                warn!(before, after, budget, "condensed summary still over budget, trimming");
            }
            Err(error) => {
                warn!(error_kind = error.error_kind(), error = %error, "compaction call failed, trimming");
            }
        }

        let trimmed = context.compact_deterministic(budget);
        debug!(before, after = trimmed.summary_len(), "carried context trimmed");
        trimmed
    }
}
