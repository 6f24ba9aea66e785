//! Unified error types for the GoCD client

use thiserror::Error;

/// Unified error type for all GoCD client operations
#[derive(Error, Debug)]
pub enum GocdError {
    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    // Lookup errors
    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    // Polling errors
    #[error("Timed out after {waited_secs}s waiting for {what}")]
    Timeout { what: String, waited_secs: u64 },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl GocdError {
    /// Whether the error is a 404 from the server
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GocdError::PipelineNotFound(_) | GocdError::Api { status: 404, .. }
        )
    }
}

/// Result type alias using GocdError
pub type Result<T> = std::result::Result<T, GocdError>;
