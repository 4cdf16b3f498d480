//! Error types for the drawing service

use thiserror::Error;

/// Result type alias for store, collage and server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while storing drawings or building a collage
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to start the service (bind, directory setup)
    #[error("Initialization failed: {0}")]
    InitializationError(String),

    /// Payload missing, empty, or not a base64 PNG data URL
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Nothing to compose
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body exceeded the configured limit (bytes)
    #[error("Payload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Reading or writing the drawings directory failed
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// A stored drawing could not be decoded as an image
    #[error("Failed to decode drawing: {0}")]
    DecodeFailure(String),

    /// The collage canvas could not be encoded as PNG
    #[error("Encoding failed: {0}")]
    EncodingFailure(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status this error surfaces as at the request boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::NotFound(_) => 404,
            Error::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Other(format!("Background task failed: {}", err))
    }
}
