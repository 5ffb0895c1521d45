//! Error types for sync operations.

use thiserror::Error;

/// Errors that can abort a sync pass.
///
/// Per-file download and upload failures are recovered inside the pass and
/// show up as counters in the summary, not as errors here.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Device scan or transport failure
    #[error("Device error: {0}")]
    Device(#[from] breeze_device::DeviceError),

    /// Cloud service failure outside the per-file upload path
    #[error("Cloud error: {0}")]
    Cloud(#[from] breeze_cloud::CloudError),

    /// IO error on the local mirror or state files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Upload tracker could not be persisted
    #[error("Tracker error: {0}")]
    Tracker(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
