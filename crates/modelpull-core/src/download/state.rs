//! Download state machine states - discriminated union published to consumers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

/// A progress snapshot derived from byte-count samples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes downloaded so far (including bytes resumed from disk).
    pub bytes_downloaded: u64,
    /// Total bytes, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Progress percentage (0.0 - 100.0). 0 while the total is unknown.
    pub percent: f64,
    /// Throughput over the recent sample window.
    pub rate_bytes_per_sec: f64,
    /// Estimated time remaining; `None` while the rate or total is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
}

impl DownloadProgress {
    /// A completed snapshot for `total` bytes.
    #[must_use]
    pub const fn complete(total: u64) -> Self {
        Self {
            bytes_downloaded: total,
            total_bytes: Some(total),
            percent: 100.0,
            rate_bytes_per_sec: 0.0,
            eta_seconds: Some(0.0),
        }
    }
}

/// States of one logical download, in the order they can occur.
///
/// ```text
/// Preparing ─┬─> Downloading ──────────────────────────┬─> [Verifying] ─> Completed
///            └─> DownloadingPart(0..n) ─> Merging ─────┘
///      any non-terminal state ─> Failed
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadState {
    /// Inspecting the download directory for existing artifacts or staging files.
    Preparing,

    /// Whole-file transfer in progress.
    Downloading {
        /// Progress of the transfer.
        progress: DownloadProgress,
    },

    /// One part of a split transfer in progress.
    DownloadingPart {
        /// Zero-based part index.
        index: u32,
        /// Total number of parts.
        total: u32,
        /// Progress within this part.
        progress: DownloadProgress,
        /// Aggregate progress across all parts.
        overall: DownloadProgress,
    },

    /// Concatenating parts into the staging output.
    Merging,

    /// Hashing the output against the expected digest.
    Verifying,

    /// The artifact is available under its final name.
    Completed {
        /// Final artifact path.
        path: PathBuf,
        /// Size of the artifact.
        total_bytes: u64,
    },

    /// The download failed; staging files are kept for a later resume
    /// unless the failure was a checksum mismatch.
    Failed {
        /// Classified failure.
        error: DownloadError,
    },
}

impl DownloadState {
    /// Whether no further state follows this one.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Progress carried by this state, if any.
    #[must_use]
    pub const fn progress(&self) -> Option<&DownloadProgress> {
        match self {
            Self::Downloading { progress } => Some(progress),
            Self::DownloadingPart { overall, .. } => Some(overall),
            _ => None,
        }
    }

    /// Short label for logs and CLI output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Downloading { .. } => "downloading",
            Self::DownloadingPart { .. } => "downloading_part",
            Self::Merging => "merging",
            Self::Verifying => "verifying",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}
