//! Breeze Core
//!
//! Shared domain types and traits for the Breeze sync pipeline.
//!
//! This crate defines:
//! - **Domain Types**: [`RemoteEntry`], [`DateBucket`], [`SyncDecision`], [`LocalState`]
//! - **Capability Traits**: [`CredentialSource`] for interactive credential supply
//! - **Run Reporting**: [`SyncSummary`]

#![forbid(unsafe_code)]

pub mod traits;
pub mod types;

// Re-export commonly used types
pub use traits::{Credentials, CredentialSource};
pub use types::{DateBucket, LocalState, RemoteEntry, SyncDecision, SyncSummary};
