//! Download domain types, states, and errors.
//!
//! This module contains pure data types for the download system. No I/O,
//! networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Requests, part planning, staging-name rules
//! - `state` - `DownloadState` and `DownloadProgress`
//! - `errors` - Error taxonomy for download operations

pub mod errors;
pub mod state;
pub mod types;

pub use errors::DownloadError;
pub use state::{DownloadProgress, DownloadState};
pub use types::{
    DownloadRequest, PART_SUFFIX, PARTIAL_SUFFIX, PartRange, is_staging_name, normalize_digest,
    plan_parts, staging_base, validate_artifact_name,
};
