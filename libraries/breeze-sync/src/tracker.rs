//! Persistent record of files already uploaded to the service.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// One tracked upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackedUpload {
    uploaded_at: String,
    filename: String,
}

/// Idempotent set of uploaded file identities, persisted as one JSON
/// document.
///
/// The whole store is loaded at construction and rewritten atomically (temp
/// file + rename) on every mutation, so a crash mid-write can never tear the
/// file. Identities are canonical absolute paths, stable across runs as long
/// as the mirror directory stays put.
pub struct UploadTracker {
    path: PathBuf,
    uploads: BTreeMap<String, TrackedUpload>,
}

impl UploadTracker {
    /// Load the tracker from `path`.
    ///
    /// A missing file is a fresh start; a corrupt file is logged loudly and
    /// treated as empty rather than failing the run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let uploads = match std::fs::read(&path) {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(uploads) => uploads,
                Err(e) => {
                    error!(
                        path = %path.display(),
                        error = %e,
                        "Upload tracker is corrupt; starting with an empty tracker"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No existing upload tracker");
                BTreeMap::new()
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read upload tracker; starting with an empty tracker"
                );
                BTreeMap::new()
            }
        };

        debug!(entries = uploads.len(), "Upload tracker loaded");
        Self { path, uploads }
    }

    /// Whether a file was uploaded in some previous run.
    pub fn is_uploaded(&self, file: &Path) -> bool {
        self.uploads.contains_key(&identity_for(file))
    }

    /// Record a successful upload. Marking an already-marked file is a no-op.
    pub fn mark_uploaded(&mut self, file: &Path) -> Result<()> {
        let key = identity_for(file);
        if self.uploads.contains_key(&key) {
            return Ok(());
        }

        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.uploads.insert(
            key,
            TrackedUpload {
                uploaded_at: chrono::Utc::now().to_rfc3339(),
                filename,
            },
        );
        self.save()?;
        debug!(file = %file.display(), "Marked as uploaded");
        Ok(())
    }

    /// Forget one file, making it eligible for upload again.
    pub fn remove(&mut self, file: &Path) -> Result<()> {
        if self.uploads.remove(&identity_for(file)).is_some() {
            self.save()?;
            debug!(file = %file.display(), "Removed from upload tracker");
        }
        Ok(())
    }

    /// Drop every record.
    pub fn clear(&mut self) -> Result<()> {
        self.uploads.clear();
        self.save()?;
        info!("Upload tracker cleared");
        Ok(())
    }

    /// Number of tracked uploads.
    pub fn count(&self) -> usize {
        self.uploads.len()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(&self.uploads)
            .map_err(|e| SyncError::Tracker(e.to_string()))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.flush()?;
        restrict_permissions(temp.path())?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Stable dedup key for a local file.
fn identity_for(file: &Path) -> String {
    std::fs::canonicalize(file)
        .unwrap_or_else(|_| file.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn test_mark_and_query() {
        let temp = TempDir::new().unwrap();
        let file = touch(&temp, "a.edf");

        let mut tracker = UploadTracker::load(temp.path().join("tracker.json"));
        assert!(!tracker.is_uploaded(&file));

        tracker.mark_uploaded(&file).unwrap();
        assert!(tracker.is_uploaded(&file));
        assert_eq!(tracker.count(), 1);
    }

    #[test]
    fn test_marking_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let file = touch(&temp, "a.edf");

        let mut tracker = UploadTracker::load(temp.path().join("tracker.json"));
        tracker.mark_uploaded(&file).unwrap();
        tracker.mark_uploaded(&file).unwrap();
        assert_eq!(tracker.count(), 1);
    }

    #[test]
    fn test_round_trip_reproduces_identities() {
        let temp = TempDir::new().unwrap();
        let a = touch(&temp, "a.edf");
        let b = touch(&temp, "b.csv");
        let tracker_path = temp.path().join("tracker.json");

        let mut tracker = UploadTracker::load(&tracker_path);
        tracker.mark_uploaded(&a).unwrap();
        tracker.mark_uploaded(&b).unwrap();

        let reloaded = UploadTracker::load(&tracker_path);
        assert_eq!(reloaded.count(), 2);
        assert!(reloaded.is_uploaded(&a));
        assert!(reloaded.is_uploaded(&b));
    }

    #[test]
    fn test_corrupt_store_starts_empty_but_still_works() {
        let temp = TempDir::new().unwrap();
        let tracker_path = temp.path().join("tracker.json");
        std::fs::write(&tracker_path, b"][ not json").unwrap();

        let file = touch(&temp, "a.edf");
        let mut tracker = UploadTracker::load(&tracker_path);
        assert_eq!(tracker.count(), 0);

        tracker.mark_uploaded(&file).unwrap();
        let reloaded = UploadTracker::load(&tracker_path);
        assert!(reloaded.is_uploaded(&file));
    }

    #[test]
    fn test_remove_and_clear() {
        let temp = TempDir::new().unwrap();
        let a = touch(&temp, "a.edf");
        let b = touch(&temp, "b.csv");

        let mut tracker = UploadTracker::load(temp.path().join("tracker.json"));
        tracker.mark_uploaded(&a).unwrap();
        tracker.mark_uploaded(&b).unwrap();

        tracker.remove(&a).unwrap();
        assert!(!tracker.is_uploaded(&a));
        assert!(tracker.is_uploaded(&b));

        tracker.clear().unwrap();
        assert_eq!(tracker.count(), 0);
    }
}
