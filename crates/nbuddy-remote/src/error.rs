//! Error types for nbuddy-remote

use thiserror::Error;

/// HTTP client error type
#[derive(Debug, Error)]
pub enum Error {
    /// Client could not be configured
    #[error("client not configured: {0}")]
    NotConfigured(String),

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Non-success HTTP status
    #[error("api error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Sanitized server detail
        message: String,
    },

    /// Response did not match the expected envelope or payload
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Map a reqwest transport error
    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_ms)
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<Error> for nbuddy_canvas::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::NotConfigured(msg) => Self::Validation(msg),
            Error::Network(msg) => Self::Network(msg),
            Error::Timeout(ms) => Self::Network(format!("timeout after {ms}ms")),
            Error::Api { status, message } => Self::Http { status, message },
            Error::InvalidResponse(msg) => Self::MalformedResponse(msg),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
