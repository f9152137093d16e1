//! Error types
//!
//! None of these ever cross the ingestion or distribution boundary; they
//! exist for configuration, startup and the sink seam.

use thiserror::Error;

/// Result type for fallible setup operations
pub type LensResult<T> = Result<T, LensError>;

/// Errors that can occur while configuring or starting the server
#[derive(Debug, Error)]
pub enum LensError {
    #[error("invalid value {value:?} for {key}")]
    Config { key: String, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by a client sink on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The peer went away; the client should be dropped
    #[error("connection closed")]
    Closed,
    /// The client's buffer is full; this frame is lost
    #[error("connection buffer full")]
    Full,
}
