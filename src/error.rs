//! WolfDrop Error Types

use thiserror::Error;

/// Result type alias for WolfDrop operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfDrop error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Storage errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("S3 request failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("S3 returned status {status} for {operation} on {key}")]
    S3Status {
        operation: &'static str,
        key: String,
        status: u16,
    },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error means the object is missing rather than the backend failing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ObjectNotFound(_) | Error::S3Status { status: 404, .. }
        )
    }
}
