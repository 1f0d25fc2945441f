use sift_core::InferenceError;

/// Errors surfaced by [`crate::ContentPipeline`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No invocation produced usable output, so there is nothing to return.
    #[error("inference unavailable from {provider} after {attempts} attempt(s)")]
    InferenceUnavailable {
        provider: String,
        attempts: usize,
        #[source]
        source: Option<InferenceError>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InferenceUnavailable { .. } => "inference_unavailable",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}
