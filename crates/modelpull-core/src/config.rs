//! Downloader configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of attempts per fetch (1 initial + 4 retries: 2s, 4s, 8s, 16s).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default first backoff delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default body streaming buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Configuration for creating a downloader.
///
/// Contains paths, retry policy, and timing knobs. Transport-specific
/// options (TLS, proxies) are handled by the transport implementation.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory where artifacts and staging files are stored.
    pub download_dir: PathBuf,
    /// Attempts per fetch before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
    /// TCP/TLS connect timeout for each attempt.
    pub connect_timeout: Duration,
    /// Maximum wait for the response head or the next body chunk.
    pub read_timeout: Duration,
    /// Largest slice written to disk per progress callback.
    pub buffer_size: usize,
    /// Minimum interval between published progress states.
    pub progress_interval: Duration,
    /// Sliding window for throughput computation.
    pub rate_window: Duration,
    /// Capacity of the per-download state channel.
    pub state_channel_capacity: usize,
    /// Bearer token sent with every request (private model repositories).
    pub auth_token: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            buffer_size: DEFAULT_BUFFER_SIZE,
            progress_interval: Duration::from_millis(500),
            rate_window: Duration::from_secs(5),
            state_channel_capacity: 64,
            auth_token: None,
        }
    }
}

impl DownloadConfig {
    /// Create a new config with the download directory.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Default::default()
        }
    }

    /// Set the number of attempts per fetch (at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the first backoff delay.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set connect and read timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Set the streaming buffer size (at least 1 byte).
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set the progress emission interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = DownloadConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.buffer_size, 8192);
        assert_eq!(config.progress_interval, Duration::from_millis(500));
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let config = DownloadConfig::new("/tmp/models")
            .with_max_attempts(0)
            .with_buffer_size(0)
            .with_auth_token(Some("  ".to_string()));
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.buffer_size, 1);
        assert!(config.auth_token.is_none());
        assert_eq!(config.download_dir, PathBuf::from("/tmp/models"));
    }
}
