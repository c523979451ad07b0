//! Error types for proxy client operations

use thiserror::Error;

/// Result type alias for proxy client operations
pub type Result<T> = std::result::Result<T, ProxyClientError>;

/// Errors that can occur during proxy client operations
#[derive(Error, Debug)]
pub enum ProxyClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error (reading a key file)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// No credentials installed on the proxy yet
    #[error("Credentials needed: {0}")]
    CredentialsNeeded(String),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },
}

impl ProxyClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }
}
