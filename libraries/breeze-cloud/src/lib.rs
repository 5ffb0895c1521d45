//! Breeze Cloud Client
//!
//! HTTP client for the sleep data service's OAuth2 and import API.
//!
//! # Features
//!
//! - **Authentication**: OAuth2 password grant, primary team resolution,
//!   persistent token cache with expiry checking
//! - **Upload**: batch imports (create → add files → process) that tolerate
//!   per-file failures
//!
//! # Example
//!
//! ```ignore
//! use breeze_cloud::{CloudClient, CloudConfig, TokenStore};
//!
//! let store = TokenStore::new(config_dir.join("token.json"));
//! let client = CloudClient::new(
//!     CloudConfig::new("https://sleep.example.com", id, secret),
//!     store,
//! )?;
//!
//! if !client.is_authenticated() {
//!     client.authenticate(&username, &password).await?;
//! }
//! let report = client.upload_files(&files, &mirror_root).await?;
//! println!("{} uploaded, {} failed", report.uploaded(), report.failed());
//! ```

mod auth;
mod client;
mod error;
mod token_store;
mod types;
mod upload;

// Re-export main types
pub use client::CloudClient;
pub use error::{CloudError, Result};
pub use token_store::TokenStore;
pub use types::{
    CachedToken, CloudConfig, TokenResponse, UploadFailure, UploadReport, UploadResult,
};
pub use upload::{content_hash, relative_upload_path};
