//! Emission gate for progress snapshots.

use std::time::{Duration, Instant};

/// Lets at most one progress snapshot through per interval.
///
/// Time is passed in by the caller; the gate never reads the clock itself.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    next_due: Option<Instant>,
}

impl ProgressThrottle {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// 500 ms, the default emission interval for download progress.
    pub const fn default_interval() -> Self {
        Self::new(Duration::from_millis(500))
    }

    /// Whether a snapshot taken at `now` may be emitted. A `true` answer
    /// starts the next interval at `now`.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        if self.next_due.is_some_and(|due| now < due) {
            return false;
        }
        self.next_due = Some(now + self.interval);
        true
    }

    /// Open the gate for the next check regardless of timing.
    pub const fn reset(&mut self) {
        self.next_due = None;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::default_interval()
    }
}
