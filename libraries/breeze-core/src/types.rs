//! Domain types shared by the device, cloud and sync crates.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// The day-level grouping a remote file belongs to.
///
/// The device stores therapy data under eight-digit `YYYYMMDD` folders; files
/// outside those folders (summary and settings files at the card root) have no
/// bucket and are always synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBucket {
    /// Not under a day folder; always in range.
    Root,
    /// Under a day folder that parsed as a calendar date.
    Day(NaiveDate),
    /// Under a folder that looked like a day bucket but did not parse.
    /// Treated as out of range rather than an error.
    Unknown,
}

impl DateBucket {
    /// The bucket's calendar date, if it has one.
    pub fn day(&self) -> Option<NaiveDate> {
        match self {
            DateBucket::Day(d) => Some(*d),
            _ => None,
        }
    }
}

/// A file discovered on the remote device.
///
/// Produced fresh on every scan and never persisted.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    /// File name as it appears in the listing (e.g. `STR.edf`).
    pub name: String,
    /// Device-relative path (e.g. `DATALOG/20240101/abc.edf`), used to map
    /// the entry onto the local mirror.
    pub path: String,
    /// Absolute download URL resolved against the listing page during the scan.
    pub url: String,
    /// Size reported by the listing; 0 when the column was absent.
    pub size: u64,
    /// Modification timestamp from the listing row, when present.
    pub modified: Option<NaiveDateTime>,
    /// Originating day bucket.
    pub bucket: DateBucket,
}

/// Comparison basis for an entry's mapped destination path.
///
/// Read from the filesystem by the orchestrator and passed by value so the
/// sync policy stays pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalState {
    pub exists: bool,
    pub size: u64,
    pub modified: Option<NaiveDateTime>,
}

impl LocalState {
    /// State for a path with no local file.
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Outcome of applying the sync policy to one remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Download the entry to its mapped destination.
    Fetch,
    /// Local copy is current (or protected by `keep_old`).
    SkipAlreadyCurrent,
    /// Name matched the ignore list.
    SkipIgnored,
    /// Day bucket fell outside the configured range.
    SkipOutOfRange,
}

/// Summary of one completed sync pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub entries_seen: usize,
    pub fetched: usize,
    pub download_failures: usize,
    pub skipped_current: usize,
    pub skipped_ignored: usize,
    pub skipped_out_of_range: usize,
    pub uploaded: usize,
    pub upload_failures: usize,
    pub upload_not_attempted: usize,
    pub duration_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_day_accessor() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(DateBucket::Day(date).day(), Some(date));
        assert_eq!(DateBucket::Root.day(), None);
        assert_eq!(DateBucket::Unknown.day(), None);
    }

    #[test]
    fn test_local_state_missing() {
        let state = LocalState::missing();
        assert!(!state.exists);
        assert_eq!(state.size, 0);
        assert!(state.modified.is_none());
    }
}
