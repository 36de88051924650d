//! Progress tracking and throttling.
//!
//! Turns raw byte-count samples into `DownloadProgress` snapshots with a
//! windowed transfer rate and ETA, rate-limited so consumers are not flooded.

mod throttle;
mod tracker;

pub use throttle::ProgressThrottle;
pub use tracker::{ProgressSample, ProgressTracker};
