//! Decides whether content is chunked and produces the chunk sequence.

use tracing::debug;

use sift_core::{estimate_tokens, BoundaryKind, Chunk, ChunkStrategy, ContentItem};

use crate::classify::classify;
use crate::error::EngineError;
use crate::split::{split, SplitConfig};

/// Thresholds for the chunking decision. Sizes are in characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Content shorter than this is processed in a single invocation.
    pub activation_threshold: usize,
    pub target_chunk_size: usize,
    pub hard_cut_factor: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 10_000,
            target_chunk_size: 8_000,
            hard_cut_factor: 4,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.target_chunk_size == 0 {
            return Err(EngineError::InvalidConfig(
                "target_chunk_size must be greater than 0".into(),
            ));
        }
        if self.hard_cut_factor == 0 {
            return Err(EngineError::InvalidConfig(
                "hard_cut_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn split_config(&self) -> SplitConfig {
        SplitConfig {
            target_chunk_size: self.target_chunk_size,
            hard_cut_factor: self.hard_cut_factor,
        }
    }
}

/// How a content item will be processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Plan {
    /// Nothing to process.
    Empty,
    /// One invocation over the whole body.
    SingleShot,
    Chunked {
        strategy: ChunkStrategy,
        chunks: Vec<Chunk>,
    },
}

impl Plan {
    pub fn chunk_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::SingleShot => 1,
            Self::Chunked { chunks, .. } => chunks.len(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChunkPlanner {
    config: PlannerConfig,
}

impl ChunkPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, item: &ContentItem, disable_chunking: bool) -> Plan {
        if item.is_empty() {
            return Plan::Empty;
        }
        if disable_chunking || item.len() < self.config.activation_threshold {
            return Plan::SingleShot;
        }

        let strategy = classify(item);
        let mut chunks = split(strategy, item.body(), &self.config.split_config());
        if chunks.is_empty() {
            chunks = Chunk::sequence(vec![(item.body().to_string(), BoundaryKind::Whole)]);
        }

        debug!(
            strategy = %strategy,
            chars = item.len(),
            est_tokens = estimate_tokens(item.body()),
            total_chunks = chunks.len(),
            "content planned"
        );
        Plan::Chunked { strategy, chunks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::ContentHint;

    fn planner() -> ChunkPlanner {
        ChunkPlanner::new(PlannerConfig::default()).unwrap()
    }

    #[test]
    fn rejects_zero_target() {
        let config = PlannerConfig {
            target_chunk_size: 0,
            ..PlannerConfig::default()
        };
        assert!(matches!(
            ChunkPlanner::new(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_content_plans_nothing() {
        let item = ContentItem::new("", ContentHint::Unknown);
        assert_eq!(planner().plan(&item, false), Plan::Empty);
        assert_eq!(planner().plan(&item, true), Plan::Empty);
    }

    #[test]
    fn below_threshold_is_single_shot() {
        let item = ContentItem::new("a".repeat(9_999), ContentHint::Text);
        assert_eq!(planner().plan(&item, false), Plan::SingleShot);
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        // 5_000 chars, 10_000 bytes.
        let item = ContentItem::new("é".repeat(5_000), ContentHint::Text);
        assert_eq!(planner().plan(&item, false), Plan::SingleShot);
    }

    #[test]
    fn disable_forces_single_shot() {
        let item = ContentItem::new("word ".repeat(10_000), ContentHint::Text);
        assert_eq!(planner().plan(&item, true), Plan::SingleShot);
    }

    #[test]
    fn large_content_is_chunked_in_order() {
        let paragraph = format!("{}\n\n", "sentence words here. ".repeat(100));
        let item = ContentItem::new(paragraph.repeat(20), ContentHint::Unknown);
        let plan = planner().plan(&item, false);

        let Plan::Chunked { strategy, chunks } = plan else {
            panic!("expected chunked plan");
        };
        assert_eq!(strategy, ChunkStrategy::Text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.char_len() <= 8_000));
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<String>(),
            item.body()
        );
    }

    #[test]
    fn at_threshold_within_target_is_one_chunk() {
        let config = PlannerConfig {
            activation_threshold: 100,
            target_chunk_size: 200,
            hard_cut_factor: 4,
        };
        let item = ContentItem::new("x".repeat(150), ContentHint::Text);
        let plan = ChunkPlanner::new(config).unwrap().plan(&item, false);
        assert_eq!(plan.chunk_count(), 1);
        assert!(matches!(plan, Plan::Chunked { .. }));
    }
}
