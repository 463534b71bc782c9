//! Error types for Docsmith.
//!
//! Library crates use [`DocsmithError`] via `thiserror`.
//! The server app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Docsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Request rejected before any side effect (missing or empty PRD).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Similarity index RPC error. Never downgraded to "no match".
    #[error("index error: {0}")]
    Index(String),

    /// Generation provider error (transport, non-success status, or an
    /// error payload in the response body).
    #[error("model error: {0}")]
    Model(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Lookup miss on the serving surface.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsmithError>;

impl DocsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
