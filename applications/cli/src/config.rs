/// Application configuration
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_device")]
    pub device: DeviceSettings,

    #[serde(default = "default_sync")]
    pub sync: SyncSettings,

    #[serde(default = "default_upload")]
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceSettings {
    /// Listing URL of the wireless SD card's root directory.
    #[serde(default = "default_device_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Local mirror directory the card is synced into.
    #[serde(default = "default_dest_path")]
    pub dest_path: PathBuf,

    /// Inclusive first day to sync (YYYY-MM-DD). Overrides `day_count`.
    #[serde(default)]
    pub start_from: Option<chrono::NaiveDate>,

    /// Sync only the N most recent days.
    #[serde(default)]
    pub day_count: Option<u32>,

    /// File names to skip, case-insensitively.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub overwrite: bool,

    #[serde(default)]
    pub keep_old: bool,

    /// Download attempts per file.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the sleep data service.
    #[serde(default)]
    pub url: String,

    /// OAuth2 client credentials issued for this agent.
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,
}

impl AppConfig {
    /// Load configuration from file and environment.
    ///
    /// An explicit `--config` path must exist; the default `breeze.toml` is
    /// optional. Environment variables prefixed with `BREEZE__` (e.g.
    /// `BREEZE__UPLOAD__CLIENT_ID`) override file values.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match config_path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("breeze.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("BREEZE")
                .separator("__")
                .try_parsing(true),
        );

        settings
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Validate configuration for the requested operation.
    pub fn validate(&self, upload_requested: bool) -> Result<()> {
        if self.device.url.is_empty() {
            bail!("device URL is required (set device.url or BREEZE__DEVICE__URL)");
        }

        if upload_requested || self.upload.enabled {
            if self.upload.url.is_empty() {
                bail!("upload service URL is required when upload is enabled");
            }
            if self.upload.client_id.is_empty() || self.upload.client_secret.is_empty() {
                bail!("upload client_id and client_secret are required when upload is enabled");
            }
        }

        Ok(())
    }
}

/// Directory for the token cache and upload tracker.
pub fn state_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("breeze")
}

// Default values
fn default_device() -> DeviceSettings {
    DeviceSettings {
        url: default_device_url(),
    }
}

fn default_device_url() -> String {
    // The card's access point address out of the box.
    "http://192.168.4.1/dir?dir=A:".to_string()
}

fn default_sync() -> SyncSettings {
    SyncSettings {
        dest_path: default_dest_path(),
        start_from: None,
        day_count: None,
        ignore: default_ignore(),
        overwrite: false,
        keep_old: false,
        retries: default_retries(),
    }
}

fn default_dest_path() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("CPAP_Data")
}

fn default_ignore() -> Vec<String> {
    breeze_sync::DEFAULT_IGNORE
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_retries() -> u32 {
    3
}

fn default_upload() -> UploadSettings {
    UploadSettings {
        enabled: false,
        url: String::new(),
        client_id: String::new(),
        client_secret: String::new(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sync: default_sync(),
            upload: default_upload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.device.url.is_empty());
        assert_eq!(config.sync.retries, 3);
        assert!(!config.upload.enabled);
        assert!(config.sync.ignore.iter().any(|n| n == "ezshare.cfg"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("breeze.toml");
        std::fs::write(
            &path,
            concat!(
                "[sync]\n",
                "day_count = 7\n",
                "overwrite = true\n",
                "[upload]\n",
                "enabled = true\n",
                "url = \"https://sleep.example.com\"\n",
                "client_id = \"cid\"\n",
                "client_secret = \"secret\"\n",
            ),
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.sync.day_count, Some(7));
        assert!(config.sync.overwrite);
        assert!(config.upload.enabled);
        config.validate(true).unwrap();
    }

    #[test]
    fn test_validate_requires_upload_credentials() {
        let mut config = AppConfig::default();
        config.upload.enabled = true;
        config.upload.url = "https://sleep.example.com".into();
        assert!(config.validate(false).is_err());

        config.upload.client_id = "cid".into();
        config.upload.client_secret = "secret".into();
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/breeze.toml"))).is_err());
    }
}
