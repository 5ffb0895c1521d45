//! The per-entry sync decision.
//!
//! `decide` is a pure function over the remote entry, the observed local
//! state and the configured policy; the orchestrator owns all filesystem and
//! network side effects. `today` is an explicit input so date-range behavior
//! is testable.

use breeze_core::{DateBucket, LocalState, RemoteEntry, SyncDecision};
use chrono::{Duration, NaiveDate};

/// Names the device keeps for its own bookkeeping; never worth mirroring.
pub const DEFAULT_IGNORE: &[&str] = &["JOURNAL.JNL", "ezshare.cfg", "System Volume Information"];

/// Knobs controlling what gets fetched.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Inclusive lower bound on day buckets. Overrides `day_count` when set.
    pub start_from: Option<NaiveDate>,
    /// Number of most recent days to include (ending today). Ignored when
    /// `start_from` is set; both unset means every day.
    pub day_count: Option<u32>,
    /// Names to skip, matched case-insensitively and exactly.
    pub ignore: Vec<String>,
    /// Re-fetch even when the local copy looks current.
    pub overwrite: bool,
    /// Never touch an existing local file. Wins over `overwrite`.
    pub keep_old: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            start_from: None,
            day_count: None,
            ignore: DEFAULT_IGNORE.iter().map(|s| (*s).to_string()).collect(),
            overwrite: false,
            keep_old: false,
        }
    }
}

/// Decide what to do with one remote entry.
pub fn decide(
    entry: &RemoteEntry,
    local: &LocalState,
    config: &PolicyConfig,
    today: NaiveDate,
) -> SyncDecision {
    if config
        .ignore
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&entry.name))
    {
        return SyncDecision::SkipIgnored;
    }

    if !bucket_in_range(entry.bucket, config, today) {
        return SyncDecision::SkipOutOfRange;
    }

    if !local.exists {
        return SyncDecision::Fetch;
    }

    if config.keep_old {
        return SyncDecision::SkipAlreadyCurrent;
    }
    if config.overwrite {
        return SyncDecision::Fetch;
    }
    if remote_is_newer(entry, local) {
        return SyncDecision::Fetch;
    }
    SyncDecision::SkipAlreadyCurrent
}

fn bucket_in_range(bucket: DateBucket, config: &PolicyConfig, today: NaiveDate) -> bool {
    match bucket {
        DateBucket::Root => true,
        DateBucket::Unknown => false,
        DateBucket::Day(day) => {
            if let Some(start) = config.start_from {
                day >= start
            } else if let Some(count) = config.day_count {
                if count == 0 {
                    false
                } else {
                    day >= today - Duration::days(i64::from(count) - 1)
                }
            } else {
                true
            }
        }
    }
}

fn remote_is_newer(entry: &RemoteEntry, local: &LocalState) -> bool {
    if entry.size > 0 && entry.size != local.size {
        return true;
    }
    match (entry.modified, local.modified) {
        (Some(remote), Some(local)) => remote > local,
        _ => false,
    }
}
