//! Breeze Sync
//!
//! The sync pipeline: decide what to fetch from the card, download it into
//! the local mirror, and relay new files to the sleep data service with
//! persistent dedup tracking.
//!
//! # Example
//!
//! ```ignore
//! use breeze_sync::{SyncConfig, SyncOrchestrator, UploadTracker};
//!
//! let config = SyncConfig::new("/data/mirror");
//! let tracker = UploadTracker::load(state_dir.join("upload_tracker.json"));
//! let mut orchestrator =
//!     SyncOrchestrator::new(device, config, tracker, Some(cloud), credentials);
//!
//! let summary = orchestrator.run().await?;
//! println!("{} fetched, {} uploaded", summary.fetched, summary.uploaded);
//! ```

mod error;
mod orchestrator;
mod policy;
mod tracker;

// Public exports
pub use error::{Result, SyncError};
pub use orchestrator::{SyncConfig, SyncOrchestrator, DEFAULT_UPLOAD_EXTENSIONS};
pub use policy::{decide, PolicyConfig, DEFAULT_IGNORE};
pub use tracker::UploadTracker;
