//! Terminal rendering.

pub mod progress;

pub use progress::DownloadBar;
