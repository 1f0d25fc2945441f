//! # sift-engine
//!
//! Adaptive chunking and sequential synthesis over a single model provider.
//!
//! - **Planning**: [`ChunkPlanner`] decides between one call and chunking,
//!   picks a [`ChunkStrategy`](sift_core::ChunkStrategy) via [`classify`]
//!   and splits through the strategy table in [`split`]
//! - **Processing**: [`SequentialProcessor`] walks chunks in order, threading a
//!   [`CarriedContext`] and compacting it when it outgrows its budget
//! - **Synthesis**: [`Synthesizer`] consolidates notes into one answer,
//!   degrading to the notes themselves when that call fails
//! - **Entry point**: [`ContentPipeline::process_content`]

#![deny(unsafe_code)]

pub mod carried;
pub mod classify;
pub mod error;
pub mod invoke;
pub mod pipeline;
pub mod planner;
pub mod processor;
pub mod prompts;
pub mod split;
pub mod synthesizer;

pub use carried::{CarriedContext, ContextEntry};
pub use classify::classify;
pub use error::EngineError;
pub use invoke::Invoker;
pub use pipeline::{ChunkingResult, ContentPipeline, PipelineConfig};
pub use planner::{ChunkPlanner, Plan, PlannerConfig};
pub use processor::{Processed, ProcessorConfig, SequentialProcessor};
pub use split::{split, SplitConfig, Splitter};
pub use synthesizer::{Synthesis, Synthesizer};
