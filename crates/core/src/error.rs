//! Core Error Types
//!
//! Defines the foundational error types used across the Work Order Safety
//! workspace. These error types are dependency-light (thiserror + serde_json)
//! so the core crate stays free of HTTP and storage concerns.
//!
//! The application crate extends these with additional variants (HTTP,
//! configuration, I/O) that require heavier dependencies.

use thiserror::Error;

/// Core error type for the Work Order Safety workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A chunk carried a negative index
    #[error("Invalid chunk index: {0}")]
    InvalidChunkIndex(i64),

    /// Submission or status call failed, or returned a malformed reply
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Attempt budget or wall-clock bound exceeded
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Required input (e.g. coordinates) missing before an operation
    #[error("Incomplete input: {0}")]
    IncompleteInput(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an incomplete input error
    pub fn incomplete_input(msg: impl Into<String>) -> Self {
        Self::IncompleteInput(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error ends the job it occurred in.
    ///
    /// Malformed chunks and validation failures are local to one message;
    /// transport and timeout failures are terminal for the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
