//! Error types for the delve research service.

use thiserror::Error;

/// Result type alias using delve's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for delve operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed trigger input; surfaced to the caller before a job starts
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Missing or unusable server-side configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query expansion produced zero usable queries
    #[error("Query generation failed: {0}")]
    QueryGeneration(String),

    /// A single query item failed during retrieval
    #[error("Query processing failed: {0}")]
    ItemProcessing(String),

    /// Final report synthesis failed or produced empty output
    #[error("Report synthesis failed: {0}")]
    ReportSynthesis(String),

    /// Report persistence failed after successful synthesis
    #[error("Storage error: {0}")]
    Storage(String),

    /// Webhook delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
