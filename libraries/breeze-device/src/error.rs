//! Error types for the device client.

use thiserror::Error;

/// Errors that can occur when talking to the wireless SD card.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Device is offline or out of range
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// Device returned an unexpected HTTP status
    #[error("Device returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Directory listing page was not in the expected form
    #[error("Malformed directory listing at {url}: {reason}")]
    Listing { url: String, reason: String },

    /// Transfer completed with the wrong number of bytes
    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Invalid device URL
    #[error("Invalid device URL: {0}")]
    InvalidUrl(String),

    /// IO error while writing to the local mirror
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// All download attempts for one file failed
    #[error("Download failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl DeviceError {
    /// Whether a fresh attempt could plausibly succeed.
    ///
    /// Connection-level failures, truncated bodies and 5xx statuses are
    /// transient on a flaky wireless link; malformed listings and 4xx
    /// statuses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            DeviceError::Request(_) | DeviceError::Unreachable(_) => true,
            DeviceError::SizeMismatch { .. } => true,
            DeviceError::Io(_) => true,
            DeviceError::Status { status, .. } => *status >= 500,
            DeviceError::Listing { .. }
            | DeviceError::InvalidUrl(_)
            | DeviceError::RetriesExhausted { .. } => false,
        }
    }
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
