//! Error types for formwright-llm

use thiserror::Error;

/// Generation backend error type.
///
/// None of these reach callers of [`crate::BatchedGenerationClient`]: every
/// failure is recovered by local synthesis. They surface through backends
/// and through the retry loop's logging.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend not configured
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// API error
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("rate limit exceeded")]
    RateLimit,

    /// Server error (5xx)
    #[error("server error: {0}")]
    ServerError(String),

    /// Response did not contain a usable field mapping
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl Error {
    /// Whether a batch call failing with this error is worth retrying.
    ///
    /// A missing backend never recovers; any non-2xx answer, malformed
    /// output or transport failure gets another try.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::NotConfigured(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
