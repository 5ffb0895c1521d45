//! Error types for the cloud client.

use thiserror::Error;

/// Errors that can occur when interacting with the sleep data service.
#[derive(Error, Debug)]
pub enum CloudError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Service is offline or unreachable
    #[error("Service unreachable: {0}")]
    ServiceUnreachable(String),

    /// Service returned an error response
    #[error("Service error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Credentials were rejected by the token endpoint
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// No valid cached token; caller must authenticate first
    #[error("Authentication required")]
    AuthRequired,

    /// The bearer token was rejected mid-flight; a fresh password grant is needed
    #[error("Access token expired or revoked")]
    AuthExpired,

    /// The account has no team to upload under
    #[error("No team associated with this account")]
    NoTeam,

    /// Failed to parse a service response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// File scheduled for upload no longer exists
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Token cache could not be read or written
    #[error("Token storage error: {0}")]
    TokenStorage(#[from] std::io::Error),

    /// Invalid service URL
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
}

/// Result type for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
