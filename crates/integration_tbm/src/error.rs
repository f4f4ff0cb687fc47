//! Departure feed error types

use thiserror::Error;

/// Transport-level failures of a feed call
///
/// Parse problems inside a successful response never surface here; they are
/// skipped per record by the parsers.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Connection to the upstream failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The upstream answered with a non-success status
    #[error("Request failed with HTTP {status}: {message}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Status reason or response excerpt
        message: String,
    },

    /// Request timeout
    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout {
        /// The timeout duration in seconds
        timeout_secs: u64,
    },

    /// The caller passed unusable arguments
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl FeedError {
    /// Returns true if retrying on the next poll may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout { .. } => true,
            Self::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidRequest(_) | Self::ConfigurationError(_) => false,
        }
    }

    /// Map a reqwest error, distinguishing timeouts
    pub(crate) fn from_transport(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else {
            Self::ConnectionFailed(err.to_string())
        }
    }
}
