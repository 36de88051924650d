//! Resumable, split, retrying HTTP downloads of model artifacts.
//!
//! - `coordinator` - `Downloader` and the per-download state machine
//! - `fetcher` - single range requests streamed into staging files
//! - `retry` - bounded exponential backoff
//! - `progress` - throttled progress snapshots with rate and ETA
//! - `merger` - part concatenation, SHA-256 verification, publication
//! - `store` - on-disk layout and resume offsets
//! - `http` - the reqwest `HttpTransport`

// Re-export core types for convenience
pub use modelpull_core::{
    BodyStream, ByteRange, DownloadConfig, DownloadError, DownloadProgress, DownloadRequest,
    DownloadState, HttpTransport, PartRange, TransportResponse, plan_parts,
};

mod coordinator;
pub mod fetcher;
mod http;
mod merger;
pub mod progress;
mod retry;
mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use coordinator::{DownloadHandle, Downloader};
pub use fetcher::{FetchReport, FetchTarget, RangeFetcher};
pub use http::{ReqwestTransport, USER_AGENT};
pub use merger::PartMerger;
pub use progress::{ProgressSample, ProgressThrottle, ProgressTracker};
pub use retry::{RetryAttempt, RetryPolicy};
pub use store::{PendingArtifact, ResumeStore};
