//! indicatif progress bar driven by `DownloadState` updates.

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use modelpull_core::{DownloadProgress, DownloadState};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";

/// Renders one download on the terminal.
///
/// Starts as a spinner and turns into a byte bar once the total is known.
/// Split downloads show overall progress with the active part in the message.
pub struct DownloadBar {
    bar: ProgressBar,
    sized: bool,
}

impl DownloadBar {
    /// Spinner drawn to stderr.
    pub fn new(artifact_name: &str) -> Self {
        Self::wrap(ProgressBar::new_spinner(), artifact_name)
    }

    /// Bar that draws nothing, for non-interactive output and tests.
    pub fn hidden(artifact_name: &str) -> Self {
        Self::wrap(ProgressBar::hidden(), artifact_name)
    }

    fn wrap(bar: ProgressBar, artifact_name: &str) -> Self {
        bar.set_style(spinner_style());
        bar.set_message(artifact_name.to_string());
        Self { bar, sized: false }
    }

    /// Reflect one state transition.
    pub fn apply(&mut self, state: &DownloadState) {
        match state {
            DownloadState::Preparing => self.bar.set_message("preparing"),
            DownloadState::Downloading { progress } => {
                self.show_progress(progress);
                self.bar.set_message("");
            }
            DownloadState::DownloadingPart {
                index,
                total,
                overall,
                ..
            } => {
                self.show_progress(overall);
                self.bar.set_message(format!("part {}/{}", index + 1, total));
            }
            DownloadState::Merging => self.bar.set_message("merging parts"),
            DownloadState::Verifying => self.bar.set_message("verifying sha256"),
            DownloadState::Completed { path, total_bytes } => {
                if self.sized {
                    self.bar.set_position(*total_bytes);
                }
                self.bar.finish_with_message(format!(
                    "saved {} ({})",
                    path.display(),
                    HumanBytes(*total_bytes)
                ));
            }
            DownloadState::Failed { error } => {
                self.bar.abandon_with_message(error.user_message());
            }
        }
    }

    /// Stop drawing without marking the bar complete.
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    fn show_progress(&mut self, progress: &DownloadProgress) {
        if let Some(total) = progress.total_bytes {
            if !self.sized {
                self.bar.set_style(bar_style());
                self.sized = true;
            }
            self.bar.set_length(total);
        }
        self.bar.set_position(progress.bytes_downloaded);
    }

    #[cfg(test)]
    fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
