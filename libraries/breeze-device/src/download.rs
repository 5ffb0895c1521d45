//! File downloads from the card with retry and atomic placement.

use crate::error::{DeviceError, Result};
use breeze_core::RemoteEntry;
use chrono::{Local, NaiveDateTime, TimeZone};
use filetime::FileTime;
use futures_util::StreamExt;
use reqwest::Client;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

/// Pause between attempts; long enough for the card to drop a wedged
/// connection, short enough not to stall the pass.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Retrying downloader for device files.
///
/// Every attempt streams into a `.part` sibling of the destination and only a
/// complete, size-verified transfer is renamed into place, so a killed or
/// failed transfer never leaves a corrupt file at the final path.
pub struct Downloader {
    http: Client,
    max_retries: u32,
}

impl Downloader {
    /// Create a downloader sharing the device client's HTTP connection pool.
    ///
    /// `max_retries` is the total number of attempts per file; values below 1
    /// are treated as 1.
    pub fn new(http: Client, max_retries: u32) -> Self {
        Self {
            http,
            max_retries: max_retries.max(1),
        }
    }

    /// Fetch one entry to `dest`, retrying transient failures from scratch.
    ///
    /// Returns the number of bytes written. On success the mirror copy gets
    /// the entry's remote timestamp so later runs can compare newness.
    pub async fn fetch(&self, entry: &RemoteEntry, dest: &Path) -> Result<u64> {
        let url =
            Url::parse(&entry.url).map_err(|e| DeviceError::InvalidUrl(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = part_path(dest)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&url, entry, dest, &part).await {
                Ok(written) => {
                    if let Some(modified) = entry.modified {
                        apply_remote_mtime(dest, modified);
                    }
                    info!(
                        path = %dest.display(),
                        size = written,
                        attempt,
                        "Downloaded file"
                    );
                    return Ok(written);
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part).await;

                    if !e.is_transient() {
                        return Err(e);
                    }
                    if attempt >= self.max_retries {
                        return Err(DeviceError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(
                        path = %dest.display(),
                        attempt,
                        error = %e,
                        "Download attempt failed, retrying"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        entry: &RemoteEntry,
        dest: &Path,
        part: &Path,
    ) -> Result<u64> {
        debug!(url = %url, dest = %dest.display(), "Requesting file");

        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                DeviceError::Unreachable(e.to_string())
            } else {
                DeviceError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_length = response.content_length();

        let mut file = File::create(part).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if let Some(expected) = content_length {
            if written != expected {
                return Err(DeviceError::SizeMismatch {
                    path: dest.display().to_string(),
                    expected,
                    actual: written,
                });
            }
        }
        // The listing size is authoritative for a finished recording; a
        // mismatch usually means the card served a truncated body.
        if entry.size > 0 && written != entry.size {
            return Err(DeviceError::SizeMismatch {
                path: dest.display().to_string(),
                expected: entry.size,
                actual: written,
            });
        }

        tokio::fs::rename(part, dest).await?;
        Ok(written)
    }
}

fn part_path(dest: &Path) -> Result<PathBuf> {
    match dest.file_name().and_then(|n| n.to_str()) {
        Some(name) => Ok(dest.with_file_name(format!("{name}.part"))),
        None => Err(DeviceError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination {} has no file name", dest.display()),
        ))),
    }
}

fn apply_remote_mtime(dest: &Path, modified: NaiveDateTime) {
    // Listing timestamps are in the card's local time.
    let ts = Local
        .from_local_datetime(&modified)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| modified.and_utc().timestamp());

    if let Err(e) = filetime::set_file_mtime(dest, FileTime::from_unix_time(ts, 0)) {
        warn!(path = %dest.display(), error = %e, "Failed to set mirror timestamp");
    }
}
