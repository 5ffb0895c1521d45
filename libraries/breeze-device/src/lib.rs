//! Breeze Device Client
//!
//! HTTP client for the wireless SD card that exposes the therapy device's
//! storage as a directory listing over a local access point.
//!
//! # Features
//!
//! - **Scanning**: walk the card's listing pages into a flat, day-bucket
//!   tagged file list
//! - **Downloading**: retrying, size-verified transfers that are renamed into
//!   the mirror only when complete
//!
//! # Example
//!
//! ```ignore
//! use breeze_device::{DeviceClient, Downloader};
//!
//! let client = DeviceClient::new("http://192.168.4.1/dir?dir=A:")?;
//! let entries = client.scan().await?;
//!
//! let downloader = Downloader::new(client.http(), 3);
//! for entry in &entries {
//!     downloader.fetch(entry, &dest_root.join(&entry.path)).await?;
//! }
//! ```

mod client;
mod download;
mod error;
mod listing;

// Re-export main types
pub use client::DeviceClient;
pub use download::Downloader;
pub use error::{DeviceError, Result};
pub use listing::{parse_day_bucket, parse_listing, ListingRow};
