//! Main cloud client: authentication lifecycle plus batch uploads.

use crate::auth::AuthClient;
use crate::error::{CloudError, Result};
use crate::token_store::TokenStore;
use crate::types::{CachedToken, CloudConfig, UploadFailure, UploadReport, UploadResult};
use crate::upload::ImportClient;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Client for the sleep data service.
///
/// Owns the HTTP connection pool and the persistent token cache. The
/// authentication lifecycle is: no valid cached token → caller supplies
/// credentials → password grant + team resolution → token cached until it
/// expires or the service rejects it, at which point the cache is cleared and
/// the cycle restarts. There is no refresh flow.
pub struct CloudClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token_store: TokenStore,
}

impl CloudClient {
    /// Create a client from configuration and a token store.
    pub fn new(config: CloudConfig, token_store: TokenStore) -> Result<Self> {
        if config.url.is_empty() {
            return Err(CloudError::InvalidUrl("URL cannot be empty".into()));
        }
        let url = config.url.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CloudError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Breeze/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: url,
            client_id: config.client_id,
            client_secret: config.client_secret,
            token_store,
        })
    }

    /// True iff a persisted, unexpired token (with its team) exists.
    pub fn is_authenticated(&self) -> bool {
        self.token_store.load().is_some()
    }

    /// Exchange credentials for a token, resolve the primary team, and
    /// persist the bundle before returning it.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<CachedToken> {
        let auth = AuthClient::new(
            &self.http,
            &self.base_url,
            &self.client_id,
            &self.client_secret,
        );

        let token = auth.password_grant(username, password).await?;
        let expires_at = chrono::Utc::now().timestamp() + token.expires_in;
        let team_id = auth.primary_team(&token.access_token).await?;

        let cached = CachedToken {
            access_token: token.access_token,
            expires_at,
            team_id,
        };
        self.token_store.save(&cached)?;

        info!(team_id = %cached.team_id, "Authentication complete");
        Ok(cached)
    }

    /// Drop the cached token, forcing re-authentication on the next upload.
    pub fn invalidate(&self) -> Result<()> {
        self.token_store.clear()
    }

    /// Upload a batch of files as one import.
    ///
    /// Each file is attempted independently; one rejection does not abort the
    /// rest. A 401 anywhere clears the token cache and leaves the remaining
    /// files [`UploadResult::NotAttempted`] — they stay eligible for the next
    /// run. Processing is triggered once when at least one file landed.
    ///
    /// # Errors
    ///
    /// Only [`CloudError::AuthRequired`] (no valid cached token) is returned
    /// as an error; everything per-file is reported in the
    /// [`UploadReport`].
    pub async fn upload_files(&self, paths: &[PathBuf], base_path: &Path) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        if paths.is_empty() {
            return Ok(report);
        }

        let token = self.token_store.load().ok_or(CloudError::AuthRequired)?;
        let import = ImportClient::new(&self.http, &self.base_url, &token.access_token);

        let import_id = match import.create_import(&token.team_id).await {
            Ok(id) => id,
            Err(CloudError::AuthExpired) => {
                warn!("Token rejected while creating import, clearing cache");
                let _ = self.token_store.clear();
                report.results = paths
                    .iter()
                    .map(|p| (p.clone(), UploadResult::NotAttempted))
                    .collect();
                return Ok(report);
            }
            Err(e) => {
                error!(error = %e, "Failed to create import, nothing uploaded");
                let failure = failure_from(&e);
                report.results = paths
                    .iter()
                    .map(|p| (p.clone(), UploadResult::Failed(failure.clone())))
                    .collect();
                return Ok(report);
            }
        };
        report.import_id = Some(import_id.clone());

        let mut expired = false;
        for path in paths {
            if expired {
                report.results.push((path.clone(), UploadResult::NotAttempted));
                continue;
            }

            match import.add_file(&import_id, path, base_path).await {
                Ok(()) => {
                    info!(file = %path.display(), import_id = %import_id, "File uploaded");
                    report.results.push((
                        path.clone(),
                        UploadResult::Uploaded {
                            import_id: import_id.clone(),
                        },
                    ));
                }
                Err(CloudError::AuthExpired) => {
                    warn!(
                        file = %path.display(),
                        "Token expired mid-batch, remaining files not attempted"
                    );
                    let _ = self.token_store.clear();
                    report
                        .results
                        .push((path.clone(), UploadResult::Failed(UploadFailure::AuthExpired)));
                    expired = true;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "File upload failed");
                    report
                        .results
                        .push((path.clone(), UploadResult::Failed(failure_from(&e))));
                }
            }
        }

        if report.uploaded() > 0 {
            if let Err(e) = import.process_files(&import_id).await {
                error!(error = %e, "Failed to trigger import processing");
            }
        }

        info!(
            uploaded = report.uploaded(),
            failed = report.failed(),
            not_attempted = report.not_attempted(),
            "Upload batch complete"
        );
        Ok(report)
    }

    /// Upload a single file as its own import.
    pub async fn upload_file(&self, path: &Path, base_path: &Path) -> Result<UploadResult> {
        let paths = [path.to_path_buf()];
        let report = self.upload_files(&paths, base_path).await?;
        Ok(report
            .results
            .into_iter()
            .next()
            .map(|(_, result)| result)
            .unwrap_or(UploadResult::NotAttempted))
    }
}

fn failure_from(e: &CloudError) -> UploadFailure {
    match e {
        CloudError::AuthExpired => UploadFailure::AuthExpired,
        CloudError::Server { status, message } => UploadFailure::Rejected {
            status: *status,
            message: message.clone(),
        },
        other => UploadFailure::Network(other.to_string()),
    }
}
