//! # sift-llm
//!
//! Inference providers behind the `sift_core::LlmProvider` trait.
//!
//! - [`OllamaProvider`]: HTTP client for `/api/generate` with NDJSON streaming
//! - [`ReliableProvider`]: retry with backoff plus a circuit breaker around any provider
//! - [`MockProvider`]: scripted responses for tests

#![deny(unsafe_code)]

pub mod mock;
pub mod ndjson;
pub mod ollama;
pub mod reliable;

pub use mock::{MockProvider, MockResponse};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use reliable::{ReliableConfig, ReliableProvider};
