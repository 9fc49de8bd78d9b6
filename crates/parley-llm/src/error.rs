//! Error types for parley-llm

use thiserror::Error;

/// Reasoning error type
#[derive(Debug, Error)]
pub enum Error {
    /// Reasoner not configured
    #[error("reasoner not configured: {0}")]
    NotConfigured(String),

    /// API error reported by the backing service
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// The request was cancelled through its token
    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network(_) | Self::Timeout(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
