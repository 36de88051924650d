//! Windowed progress computation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use modelpull_core::DownloadProgress;

use super::ProgressThrottle;

/// One observation of the transfer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Absolute position in the resource (resumed bytes included).
    pub bytes_transferred: u64,
    /// Total size, if known at the time of the sample.
    pub total_bytes: Option<u64>,
    /// When the sample was taken.
    pub timestamp: Instant,
}

impl ProgressSample {
    /// A sample taken now.
    pub fn now(bytes_transferred: u64, total_bytes: Option<u64>) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
            timestamp: Instant::now(),
        }
    }
}

/// Derives throttled progress snapshots for one transfer attempt.
///
/// `percent` never decreases over the tracker's lifetime. The rate is the
/// byte delta across the samples inside the window, so bytes already on disk
/// at the start of a resume do not inflate it.
#[derive(Debug)]
pub struct ProgressTracker {
    throttle: ProgressThrottle,
    rate_window: Duration,
    samples: VecDeque<(Instant, u64)>,
    total: Option<u64>,
    last_percent: f64,
}

impl ProgressTracker {
    /// Create a tracker emitting at most once per `interval`, with a rate
    /// averaged over `rate_window`.
    pub fn new(interval: Duration, rate_window: Duration) -> Self {
        Self {
            throttle: ProgressThrottle::new(interval),
            rate_window,
            samples: VecDeque::new(),
            total: None,
            last_percent: 0.0,
        }
    }

    /// Set the total once it becomes known.
    pub const fn set_total(&mut self, total: Option<u64>) {
        if total.is_some() {
            self.total = total;
        }
    }

    /// Record a sample; returns a snapshot when the throttle allows one.
    pub fn record(&mut self, sample: ProgressSample) -> Option<DownloadProgress> {
        self.push(sample);
        self.throttle
            .should_emit(sample.timestamp)
            .then(|| self.snapshot())
    }

    /// Record a sample without producing a snapshot.
    pub fn update(&mut self, sample: ProgressSample) {
        self.push(sample);
    }

    /// Snapshot of the latest sample, bypassing the throttle.
    pub fn current(&mut self) -> DownloadProgress {
        self.snapshot()
    }

    /// Record a final sample and return a snapshot unconditionally.
    pub fn finish(&mut self, sample: ProgressSample) -> DownloadProgress {
        self.push(sample);
        self.throttle.reset();
        self.throttle.should_emit(sample.timestamp);
        self.snapshot()
    }

    fn push(&mut self, sample: ProgressSample) {
        self.set_total(sample.total_bytes);

        // A restart from a lower offset invalidates the rate history.
        if self
            .samples
            .back()
            .is_some_and(|&(_, bytes)| sample.bytes_transferred < bytes)
        {
            self.samples.clear();
        }
        self.samples
            .push_back((sample.timestamp, sample.bytes_transferred));

        while self.samples.len() > 2
            && self.samples.front().is_some_and(|&(at, _)| {
                sample.timestamp.saturating_duration_since(at) > self.rate_window
            })
        {
            self.samples.pop_front();
        }
    }

    fn rate(&self) -> f64 {
        let (Some(&(first_at, first)), Some(&(last_at, last))) =
            (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };
        let elapsed = last_at.saturating_duration_since(first_at).as_secs_f64();
        if self.samples.len() < 2 || elapsed <= 0.0 {
            return 0.0;
        }
        last.saturating_sub(first) as f64 / elapsed
    }

    fn snapshot(&mut self) -> DownloadProgress {
        let bytes = self.samples.back().map_or(0, |&(_, bytes)| bytes);
        let rate = self.rate();

        let percent = match self.total {
            Some(total) if total > 0 => (bytes as f64 * 100.0 / total as f64).clamp(0.0, 100.0),
            _ => 0.0,
        };
        let percent = percent.max(self.last_percent);
        self.last_percent = percent;

        let eta_seconds = match self.total {
            Some(total) if rate > 0.0 => Some(total.saturating_sub(bytes) as f64 / rate),
            _ => None,
        };

        DownloadProgress {
            bytes_downloaded: bytes,
            total_bytes: self.total,
            percent,
            rate_bytes_per_sec: rate,
            eta_seconds,
        }
    }
}
