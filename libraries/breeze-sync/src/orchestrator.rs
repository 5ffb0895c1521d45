//! The end-to-end sync pass.

use crate::error::Result;
use crate::policy::{decide, PolicyConfig};
use crate::tracker::UploadTracker;
use breeze_cloud::{CloudClient, UploadResult};
use breeze_core::{CredentialSource, LocalState, SyncDecision, SyncSummary};
use breeze_device::{DeviceClient, Downloader};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Extensions worth sending to the service; everything else on the card is
/// firmware bookkeeping.
pub const DEFAULT_UPLOAD_EXTENSIONS: &[&str] =
    &["edf", "csv", "crc", "json", "dat", "log", "tgt"];

/// System files that never belong in an upload, even under force.
const SKIP_UPLOAD_FILES: &[&str] = &["JOURNAL.JNL", ".DS_Store", "Thumbs.db"];

/// Orchestrator settings beyond the fetch policy.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local mirror root the card is synced into.
    pub dest_root: PathBuf,
    /// Attempts per file download.
    pub max_retries: u32,
    /// What to fetch.
    pub policy: PolicyConfig,
    /// Whether the upload stage runs at all.
    pub upload_enabled: bool,
    /// Upload the whole mirror and bypass the tracker check.
    pub force_upload: bool,
    /// Extension allow-list for upload candidates.
    pub upload_extensions: Vec<String>,
}

impl SyncConfig {
    /// Defaults for a given mirror root: three download attempts, upload off.
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
            max_retries: 3,
            policy: PolicyConfig::default(),
            upload_enabled: false,
            force_upload: false,
            upload_extensions: DEFAULT_UPLOAD_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Drives one full pass: scan, plan, download, then hand newly synced files
/// to the upload stage.
///
/// All transfers are strictly sequential; neither the card nor the service
/// tolerates being hammered over several connections.
pub struct SyncOrchestrator {
    device: DeviceClient,
    downloader: Downloader,
    config: SyncConfig,
    tracker: UploadTracker,
    cloud: Option<CloudClient>,
    credentials: Arc<dyn CredentialSource>,
}

impl SyncOrchestrator {
    pub fn new(
        device: DeviceClient,
        config: SyncConfig,
        tracker: UploadTracker,
        cloud: Option<CloudClient>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let downloader = Downloader::new(device.http(), config.max_retries);
        Self {
            device,
            downloader,
            config,
            tracker,
            cloud,
            credentials,
        }
    }

    /// Run one sync pass and report what happened.
    ///
    /// # Errors
    ///
    /// Only a failed scan aborts the pass — without a trustworthy file list
    /// there is nothing to act on. Individual download and upload failures
    /// are logged, counted in the summary and retried naturally on the next
    /// invocation.
    pub async fn run(&mut self) -> Result<SyncSummary> {
        let start = Instant::now();
        let mut summary = SyncSummary::default();

        info!(url = %self.device.base_url(), "Starting sync pass");
        let entries = self.device.scan().await?;
        summary.entries_seen = entries.len();

        let today = Local::now().date_naive();
        let mut downloaded: Vec<PathBuf> = Vec::new();

        for entry in &entries {
            let dest = self.config.dest_root.join(&entry.path);
            let local = local_state(&dest);

            match decide(entry, &local, &self.config.policy, today) {
                SyncDecision::Fetch => match self.downloader.fetch(entry, &dest).await {
                    Ok(_) => {
                        summary.fetched += 1;
                        downloaded.push(dest);
                    }
                    Err(e) => {
                        warn!(file = %entry.path, error = %e, "Download failed, continuing");
                        summary.download_failures += 1;
                    }
                },
                SyncDecision::SkipAlreadyCurrent => {
                    debug!(file = %entry.path, "Local copy is current");
                    summary.skipped_current += 1;
                }
                SyncDecision::SkipIgnored => {
                    debug!(file = %entry.path, "Ignored by name");
                    summary.skipped_ignored += 1;
                }
                SyncDecision::SkipOutOfRange => {
                    debug!(file = %entry.path, "Outside the configured date range");
                    summary.skipped_out_of_range += 1;
                }
            }
        }

        info!(
            fetched = summary.fetched,
            failures = summary.download_failures,
            "Download phase complete"
        );

        self.upload_stage(downloaded, &mut summary).await;

        summary.duration_seconds = start.elapsed().as_secs();
        info!(
            fetched = summary.fetched,
            uploaded = summary.uploaded,
            duration_seconds = summary.duration_seconds,
            "Sync pass complete"
        );
        Ok(summary)
    }

    /// Read access to the tracker, mainly for inspection after a run.
    pub fn tracker(&self) -> &UploadTracker {
        &self.tracker
    }

    async fn upload_stage(&mut self, downloaded: Vec<PathBuf>, summary: &mut SyncSummary) {
        if !self.config.upload_enabled {
            debug!("Upload disabled, skipping upload stage");
            return;
        }
        let Some(cloud) = &self.cloud else {
            debug!("No cloud client configured, skipping upload stage");
            return;
        };

        // A normal run only uploads when this pass brought something new;
        // force mode skips the gate and the tracker check. Candidates are
        // drawn from the whole mirror so a file whose upload failed last run
        // stays eligible until it is finally recorded.
        if !self.config.force_upload && downloaded.is_empty() {
            info!("No new files downloaded, skipping upload stage");
            return;
        }

        let pending: Vec<PathBuf> = mirror_files(&self.config.dest_root)
            .into_iter()
            .filter(|p| has_allowed_extension(p, &self.config.upload_extensions))
            .filter(|p| self.config.force_upload || !self.tracker.is_uploaded(p))
            .collect();

        if pending.is_empty() {
            info!("Nothing new to upload");
            return;
        }

        if !cloud.is_authenticated() {
            let creds = match self.credentials.get() {
                Ok(creds) => creds,
                Err(e) => {
                    error!(error = %e, "No credentials available, skipping upload");
                    summary.upload_not_attempted += pending.len();
                    return;
                }
            };
            if let Err(e) = cloud.authenticate(&creds.username, &creds.password).await {
                error!(error = %e, "Authentication failed, skipping upload");
                summary.upload_not_attempted += pending.len();
                return;
            }
        }

        info!(files = pending.len(), "Uploading new files");
        let report = match cloud.upload_files(&pending, &self.config.dest_root).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Upload batch failed to start");
                summary.upload_not_attempted += pending.len();
                return;
            }
        };

        for (path, result) in &report.results {
            match result {
                UploadResult::Uploaded { .. } => {
                    summary.uploaded += 1;
                    if let Err(e) = self.tracker.mark_uploaded(path) {
                        // Not fatal: the worst case is a redundant upload
                        // next run, which the service dedups.
                        warn!(file = %path.display(), error = %e, "Failed to record upload");
                    }
                }
                UploadResult::Failed(failure) => {
                    warn!(file = %path.display(), failure = ?failure, "Upload failed");
                    summary.upload_failures += 1;
                }
                UploadResult::NotAttempted => {
                    summary.upload_not_attempted += 1;
                }
            }
        }
    }
}

/// Observe the destination path for the policy.
fn local_state(path: &Path) -> LocalState {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => LocalState {
            exists: true,
            size: meta.len(),
            modified: meta
                .modified()
                .ok()
                .map(|t| DateTime::<Local>::from(t).naive_local()),
        },
        _ => LocalState::missing(),
    }
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| allowed == &ext)
        })
        .unwrap_or(false)
}

/// Every data file currently in the mirror, in stable name order.
fn mirror_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            let name = p
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            !name.starts_with('.') && !SKIP_UPLOAD_FILES.contains(&name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_has_allowed_extension() {
        let exts: Vec<String> = DEFAULT_UPLOAD_EXTENSIONS
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert!(has_allowed_extension(Path::new("a.edf"), &exts));
        assert!(has_allowed_extension(Path::new("a.EDF"), &exts));
        assert!(has_allowed_extension(Path::new("b.csv"), &exts));
        assert!(!has_allowed_extension(Path::new("b.tmp"), &exts));
        assert!(!has_allowed_extension(Path::new("noext"), &exts));
    }

    #[test]
    fn test_mirror_files_skips_system_entries() {
        let temp = TempDir::new().unwrap();
        let datalog = temp.path().join("DATALOG/20240101");
        fs::create_dir_all(&datalog).unwrap();
        fs::write(temp.path().join("STR.edf"), b"x").unwrap();
        fs::write(datalog.join("a.edf"), b"x").unwrap();
        fs::write(temp.path().join("JOURNAL.JNL"), b"x").unwrap();
        fs::write(temp.path().join(".hidden"), b"x").unwrap();

        let mut names: Vec<String> = mirror_files(temp.path())
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["STR.edf", "a.edf"]);
    }

    #[test]
    fn test_local_state_reads_metadata() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.edf");
        fs::write(&file, b"12345").unwrap();

        let state = local_state(&file);
        assert!(state.exists);
        assert_eq!(state.size, 5);
        assert!(state.modified.is_some());

        assert!(!local_state(&temp.path().join("missing")).exists);
        // A directory is not a usable local copy.
        assert!(!local_state(temp.path()).exists);
    }
}
