//! Error types for nbuddy-canvas
//!
//! Errors fall into three groups: validation failures raised before any I/O,
//! transport/HTTP failures from the remote services, and malformed responses.
//! Every variant can be turned into a message suitable for the UI.

use thiserror::Error;

use crate::document::BlockId;

/// Canvas error type
#[derive(Debug, Error)]
pub enum Error {
    /// Block not found in the open canvas
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    /// Canvas not found in the remote store or the local mirror
    #[error("canvas not found: {0}")]
    CanvasNotFound(String),

    /// Input rejected before any I/O
    #[error("validation failed: {0}")]
    Validation(String),

    /// Upload larger than the configured limit
    #[error("file too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge {
        /// Size of the rejected file
        size: u64,
        /// Configured limit
        limit: u64,
    },

    /// Transport-level failure (connect, timeout, reset)
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("http error {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Server-provided detail, if any
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Local mirror read/write failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The autosave task has been cancelled or has stopped
    #[error("autosave stopped")]
    AutosaveStopped,
}

impl Error {
    /// Create a validation error
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a network error
    #[must_use]
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a malformed response error
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a storage error
    #[must_use]
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Check if the user can recover by re-triggering the action
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::MalformedResponse(_)
        )
    }

    /// Check if the error was raised before any network call
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::FileTooLarge { .. })
    }

    /// Get error code for status reporting
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BlockNotFound(_) => "block_not_found",
            Self::CanvasNotFound(_) => "canvas_not_found",
            Self::Validation(_) => "validation_error",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::Network(_) => "network_error",
            Self::Http { .. } => "http_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Storage(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::AutosaveStopped => "autosave_stopped",
        }
    }

    /// Message shown to the user in place of the raw error
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::BlockNotFound(_) => "That block no longer exists.".to_string(),
            Self::CanvasNotFound(_) => "That canvas could not be found.".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::FileTooLarge { limit, .. } => format!(
                "File is too large. The maximum size is {} MB.",
                limit / (1024 * 1024)
            ),
            Self::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Http { status, .. } => {
                format!("The server rejected the request (HTTP {status}). Please try again.")
            }
            Self::MalformedResponse(_) => {
                "The server sent an unexpected response. Please try again.".to_string()
            }
            Self::Storage(_) | Self::Serialization(_) => {
                "Local copy could not be updated.".to_string()
            }
            Self::AutosaveStopped => "Changes can no longer be saved for this canvas.".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for canvas operations
pub type Result<T> = std::result::Result<T, Error>;
