use thiserror::Error;

/// Failure modes of the generative endpoint that callers must tell apart:
/// rate limiting clears on its own, quota exhaustion does not, and a
/// malformed payload is a valid transport response that failed to parse.
#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("missing API key for the generative endpoint")]
    MissingApiKey,
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("model endpoint overloaded: {0}")]
    Overloaded(String),
    #[error("model endpoint rejected the credentials: {0}")]
    AuthFailed(String),
    #[error("model endpoint returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl GenAiError {
    /// Retryable after a backoff window.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Not retryable within the current billing period.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}
