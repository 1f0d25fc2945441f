//! # sift-core
//!
//! Shared vocabulary for the sift content pipeline.
//!
//! - **Content**: `ContentItem`, `ContentHint`, `ChunkStrategy`
//! - **Chunks**: `Chunk` and the `BoundaryKind` it ends on
//! - **Inference**: the `LlmProvider` trait, `Prompt`, `StreamEvent`
//! - **Errors**: `InferenceError`, classified as retryable / fatal / operational

#![deny(unsafe_code)]

pub mod chunk;
pub mod content;
pub mod errors;
pub mod prompt;
pub mod provider;
pub mod stream;
pub mod tokens;

pub use chunk::{BoundaryKind, Chunk};
pub use content::{ChunkStrategy, ContentHint, ContentItem};
pub use errors::InferenceError;
pub use prompt::Prompt;
pub use provider::{GenerateOptions, LlmProvider};
pub use stream::{collect_text, EventStream, StreamEvent};
pub use tokens::estimate_tokens;
