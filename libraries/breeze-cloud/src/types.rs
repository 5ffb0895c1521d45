//! Types for the sleep data service's API requests and responses.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for connecting to the service.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the service (e.g. "https://sleep.example.com")
    pub url: String,
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
}

impl CloudConfig {
    pub fn new(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Response from the token endpoint.
///
/// The password grant carries no refresh token; only the access token and its
/// lifetime matter.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Token validity in seconds
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

/// The service has historically answered with a two-hour lifetime when the
/// field is omitted.
fn default_expires_in() -> i64 {
    7200
}

/// A cached bearer token bundled with the team it uploads under.
///
/// Persisted as the token cache file; the sole authentication state that
/// survives restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    /// Unix timestamp after which the token must not be presented
    pub expires_at: i64,
    pub team_id: String,
}

/// Outcome for a single file within an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    /// File landed in the given import.
    Uploaded { import_id: String },
    /// Attempted and failed; the file stays eligible for the next run.
    Failed(UploadFailure),
    /// Never attempted because the batch stopped early (token expiry or
    /// import creation failure).
    NotAttempted,
}

/// Why an attempted upload failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    /// Bearer token was rejected; re-authentication required.
    AuthExpired,
    /// Connection-level failure.
    Network(String),
    /// The service rejected the file.
    Rejected { status: u16, message: String },
}

/// Result of one batch upload.
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    /// Import the batch was attached to, when one was created.
    pub import_id: Option<String>,
    /// Per-file outcomes, in submission order.
    pub results: Vec<(PathBuf, UploadResult)>,
}

impl UploadReport {
    pub fn uploaded(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, UploadResult::Uploaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, UploadResult::Failed(_)))
            .count()
    }

    pub fn not_attempted(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, UploadResult::NotAttempted))
            .count()
    }

    /// True when the batch stopped on a rejected bearer token.
    pub fn auth_expired(&self) -> bool {
        self.results
            .iter()
            .any(|(_, r)| matches!(r, UploadResult::Failed(UploadFailure::AuthExpired)))
    }
}
