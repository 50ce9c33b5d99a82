//! Error types for the Sitevote service.

use thiserror::Error;

/// Main error type for Sitevote operations.
#[derive(Error, Debug)]
pub enum SitevoteError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request argument failed validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The voted-for item does not exist in the directory
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Public IP lookup or remote procedure call failed in transit
    #[error("Network error: {0}")]
    Network(String),

    /// The vote procedure answered with something other than a known status
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Local vote storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// gRPC transport errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// Status returned by the remote vote service
    #[error("Remote status: {0}")]
    Status(#[from] tonic::Status),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SitevoteError> for tonic::Status {
    fn from(err: SitevoteError) -> Self {
        match err {
            SitevoteError::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            SitevoteError::ItemNotFound(item) => {
                tonic::Status::not_found(format!("item {} not found", item))
            }
            SitevoteError::Status(status) => status,
            other => tonic::Status::internal(other.to_string()),
        }
    }
}

/// Result type alias for Sitevote operations.
pub type Result<T> = std::result::Result<T, SitevoteError>;
