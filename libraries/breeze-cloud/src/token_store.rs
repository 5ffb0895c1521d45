//! Persistent token cache with expiry checking.

use crate::error::Result;
use crate::types::CachedToken;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tokens within this many seconds of expiry are treated as already expired,
/// so a request started just before the boundary cannot race it.
const EXPIRY_SKEW_SECS: i64 = 60;

/// File-backed cache for the service's bearer token.
///
/// The cache file is JSON (`access_token`, `expires_at`, `team_id`) with
/// owner-only permissions and is the sole source of authentication state
/// across restarts. Writes go through a temp file and an atomic rename.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token if it exists and is still valid.
    ///
    /// A missing file, a corrupt file, or an expired token all yield `None`;
    /// corruption is logged and the caller simply re-authenticates.
    pub fn load(&self) -> Option<CachedToken> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read token cache");
                return None;
            }
        };

        let token: CachedToken = match serde_json::from_slice(&data) {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Token cache is corrupt, ignoring it"
                );
                return None;
            }
        };

        if !is_still_valid(&token, chrono::Utc::now().timestamp()) {
            debug!("Cached token has expired");
            return None;
        }

        debug!(team_id = %token.team_id, "Loaded valid cached token");
        Some(token)
    }

    /// Persist a token, replacing any previous one.
    ///
    /// The file is written with owner-only permissions before the rename
    /// makes it visible.
    pub fn save(&self, token: &CachedToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(token)
            .map_err(|e| crate::CloudError::ParseError(e.to_string()))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.flush()?;

        restrict_permissions(temp.path())?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), "Token cached");
        Ok(())
    }

    /// Drop the cached token. Idempotent.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_still_valid(token: &CachedToken, now: i64) -> bool {
    now < token.expires_at - EXPIRY_SKEW_SECS
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

    fn token(expires_at: i64) -> CachedToken {
        CachedToken {
            access_token: "tok-123".into(),
            expires_at,
            team_id: "team-1".into(),
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        let future = chrono::Utc::now().timestamp() + 3600;
        store.save(&token(future)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.access_token, "tok-123");
        assert_eq!(loaded.team_id, "team-1");
        assert_eq!(loaded.expires_at, future);
    }

    #[test]
    fn test_expired_token_is_not_loaded() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        let past = chrono::Utc::now().timestamp() - 10;
        store.save(&token(past)).unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_token_inside_skew_window_is_expired() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        // Valid for 30 more seconds, inside the 60 second skew window.
        let soon = chrono::Utc::now().timestamp() + 30;
        store.save(&token(soon)).unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = TokenStore::new(&path);
        assert!(store.load().is_none());
    }

    #[test]
    fn test_missing_cache_is_none() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("missing.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        let future = chrono::Utc::now().timestamp() + 3600;
        store.save(&token(future)).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        let future = chrono::Utc::now().timestamp() + 3600;
        store.save(&token(future)).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
