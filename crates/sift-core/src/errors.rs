use std::time::Duration;

/// Typed error hierarchy for model invocations.
/// Classifies errors as fatal (don't retry), retryable, or operational.
#[derive(Clone, Debug, thiserror::Error)]
pub enum InferenceError {
    // Fatal, not retried
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Retryable
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("provider overloaded")]
    ProviderOverloaded,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    // Operational
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("cancelled")]
    Cancelled,
}

impl InferenceError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::ProviderOverloaded
                | Self::NetworkError(_)
                | Self::StreamInterrupted(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::ModelNotFound(_) | Self::InvalidRequest(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn suggested_delay(&self) -> Option<Duration> {
        if let Self::RateLimited { retry_after } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::ModelNotFound(_) => "model_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::ProviderOverloaded => "provider_overloaded",
            Self::NetworkError(_) => "network_error",
            Self::StreamInterrupted(_) => "stream_interrupted",
            Self::Timeout(_) => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::Cancelled => "cancelled",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            404 => Self::ModelNotFound(body),
            400 | 422 => Self::InvalidRequest(body),
            429 => Self::RateLimited { retry_after: None },
            503 => Self::ProviderOverloaded,
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(InferenceError::RateLimited { retry_after: None }.is_retryable());
        assert!(InferenceError::ServerError { status: 500, body: "err".into() }.is_retryable());
        assert!(InferenceError::ProviderOverloaded.is_retryable());
        assert!(InferenceError::NetworkError("refused".into()).is_retryable());
        assert!(InferenceError::StreamInterrupted("eof".into()).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(InferenceError::AuthenticationFailed("bad key".into()).is_fatal());
        assert!(InferenceError::ModelNotFound("qwen".into()).is_fatal());
        assert!(InferenceError::InvalidRequest("bad".into()).is_fatal());
    }

    #[test]
    fn timeout_is_operational() {
        let timeout = InferenceError::Timeout(Duration::from_secs(30));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_retryable());
        assert!(!timeout.is_fatal());

        assert!(!InferenceError::EmptyResponse.is_retryable());
        assert!(!InferenceError::Cancelled.is_fatal());
    }

    #[test]
    fn from_status_mapping() {
        assert!(InferenceError::from_status(401, "unauthorized".into()).is_fatal());
        assert!(matches!(
            InferenceError::from_status(404, "model 'x' not found".into()),
            InferenceError::ModelNotFound(_)
        ));
        assert!(InferenceError::from_status(400, "bad request".into()).is_fatal());
        assert!(InferenceError::from_status(429, "slow down".into()).is_retryable());
        assert!(InferenceError::from_status(503, "busy".into()).is_retryable());
        assert!(InferenceError::from_status(502, "bad gateway".into()).is_retryable());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(InferenceError::Timeout(Duration::from_secs(1)).error_kind(), "timeout");
        assert_eq!(InferenceError::EmptyResponse.error_kind(), "empty_response");
        assert_eq!(
            InferenceError::RateLimited { retry_after: Some(Duration::from_secs(2)) }.error_kind(),
            "rate_limited"
        );
    }

    #[test]
    fn suggested_delay_only_for_rate_limit() {
        let rl = InferenceError::RateLimited {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(rl.suggested_delay(), Some(Duration::from_secs(5)));
        assert_eq!(InferenceError::ProviderOverloaded.suggested_delay(), None);
    }
}
