//! Per-download worker task.
//!
//! The worker owns everything it needs (cloned config, transport `Arc`, a
//! store handle) and runs the state machine for one request, publishing
//! `DownloadState`s through the handle's channel.
//!
//! # Design Principles
//!
//! - Phase and terminal states are sent with backpressure; progress states
//!   use `try_send` and may be dropped when the consumer lags
//! - Every attempt re-reads the resume offset from disk
//! - Cancellation ends the run without a terminal state and keeps staging files

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use modelpull_core::{
    ByteRange, DownloadConfig, DownloadError, DownloadProgress, DownloadRequest, DownloadState,
    PartRange, plan_parts,
};

use crate::fetcher::{FetchTarget, RangeFetcher};
use crate::merger::{PartMerger, remove_if_exists};
use crate::progress::{ProgressSample, ProgressTracker};
use crate::retry::{RetryAttempt, RetryPolicy};
use crate::store::ResumeStore;

/// Position of one part within a split download.
#[derive(Debug, Clone, Copy)]
struct PartSlot {
    range: PartRange,
    count: u32,
    total: u64,
    /// Bytes of all parts before this one.
    completed_before: u64,
}

/// Runs one download request to a terminal state.
pub(super) struct Worker {
    pub(super) fetcher: RangeFetcher,
    pub(super) retry: RetryPolicy,
    pub(super) merger: PartMerger,
    pub(super) store: ResumeStore,
    pub(super) config: DownloadConfig,
    pub(super) tx: mpsc::Sender<DownloadState>,
    pub(super) cancel: CancellationToken,
}

impl Worker {
    /// Run the request and publish the terminal state.
    pub(super) async fn run(self, request: DownloadRequest) {
        let artifact = request.artifact_name.clone();

        let result = self.execute(&request).await;
        if self.cancel.is_cancelled() {
            tracing::info!(target: "modelpull.download", %artifact, "Download cancelled");
            return;
        }

        let terminal = match result {
            Ok((path, total_bytes)) => {
                tracing::info!(
                    target: "modelpull.download",
                    %artifact,
                    path = %path.display(),
                    total_bytes,
                    "Download completed"
                );
                DownloadState::Completed { path, total_bytes }
            }
            Err(DownloadError::Cancelled) => {
                tracing::info!(target: "modelpull.download", %artifact, "Download cancelled");
                return;
            }
            Err(error) => {
                tracing::error!(
                    target: "modelpull.download",
                    %artifact,
                    error = %error,
                    "Download failed"
                );
                DownloadState::Failed { error }
            }
        };

        // The receiver may already be gone; nothing left to report to.
        let _ = self.tx.send(terminal).await;
    }

    async fn execute(&self, request: &DownloadRequest) -> Result<(PathBuf, u64), DownloadError> {
        request.validate()?;
        self.emit(DownloadState::Preparing).await?;
        self.store.ensure_dir().await?;

        let name = request.artifact_name.as_str();
        let final_path = self.store.final_path(name);
        let staging = self.store.staging_files(name).await?;

        if staging.is_empty() && self.store.is_file(&final_path).await {
            let size = self.store.resume_offset(&final_path).await?;
            match request.expected_total_bytes {
                Some(expected) if expected != size => {
                    tracing::warn!(
                        target: "modelpull.download",
                        artifact = name,
                        size,
                        expected,
                        "Existing artifact has the wrong size, downloading again"
                    );
                }
                _ => {
                    tracing::info!(
                        target: "modelpull.download",
                        artifact = name,
                        size,
                        "Artifact already downloaded"
                    );
                    return Ok((final_path, size));
                }
            }
        }

        tracing::info!(
            target: "modelpull.download",
            artifact = name,
            url = %request.source_url,
            split = request.is_split(),
            resume = request.resume_enabled,
            "Starting download"
        );

        let total = match request.part_size_bytes {
            Some(part_size) => self.download_split(request, part_size).await?,
            None => self.download_whole(request).await?,
        };
        Ok((final_path, total))
    }

    // ---------------------------------------------------------------------
    // Whole-file flow
    // ---------------------------------------------------------------------

    async fn download_whole(&self, request: &DownloadRequest) -> Result<u64, DownloadError> {
        let name = request.artifact_name.as_str();
        let partial = self.store.partial_path(name);

        let offset = self
            .store
            .prepare_staging(&partial, request.resume_enabled, request.expected_total_bytes)
            .await?;
        if offset > 0 {
            tracing::info!(target: "modelpull.download", artifact = name, offset, "Resuming download");
        }

        let this = self;
        let partial_ref = partial.as_path();
        let total = self
            .retry
            .execute(&self.cancel, move |attempt| {
                this.whole_attempt(request, partial_ref, attempt)
            })
            .await?;

        if let Some(digest) = &request.expected_digest {
            self.emit(DownloadState::Verifying).await?;
            self.merger.verify(&partial, digest, &self.cancel).await?;
        }

        // Part files left by an interrupted split run of the same artifact.
        let stale_parts: Vec<PathBuf> = self
            .store
            .staging_files(name)
            .await?
            .into_iter()
            .filter(|staged| staged.part_index.is_some())
            .map(|staged| staged.path)
            .collect();
        self.merger
            .finish(&partial, &self.store.final_path(name), &stale_parts)
            .await?;
        Ok(total)
    }

    /// One attempt of a whole-file transfer, resuming from the staging length.
    async fn whole_attempt(
        &self,
        request: &DownloadRequest,
        partial: &Path,
        attempt: RetryAttempt,
    ) -> Result<u64, DownloadError> {
        let expected = request.expected_total_bytes;
        let mut offset = self.store.prepare_staging(partial, true, expected).await?;
        if attempt.attempt_number > 1 {
            tracing::info!(
                target: "modelpull.download",
                artifact = %request.artifact_name,
                attempt = attempt.attempt_number,
                offset,
                "Retrying from staging offset"
            );
        }

        let mut tracker = self.tracker();
        tracker.set_total(expected);
        let mut reported_total = None;

        if expected.is_none_or(|total| offset < total) {
            loop {
                if let Some(progress) = tracker.record(ProgressSample::now(offset, expected)) {
                    self.emit_progress(DownloadState::Downloading { progress });
                }

                let mut file = self.store.open_append(partial).await?;
                let target = FetchTarget {
                    url: &request.source_url,
                    range: ByteRange::starting_at(offset),
                    expected_total: expected,
                };
                let tx = &self.tx;
                let result = self
                    .fetcher
                    .fetch(target, &mut file, &self.cancel, &mut |position, total| {
                        if let Some(progress) = tracker.record(ProgressSample::now(position, total))
                        {
                            let _ = tx.try_send(DownloadState::Downloading { progress });
                        }
                    })
                    .await;
                drop(file);

                match result {
                    Ok(report) => {
                        reported_total = report.total_bytes;
                        break;
                    }
                    Err(
                        e @ (DownloadError::RangeIgnored | DownloadError::ResumePastEnd { .. }),
                    ) if offset > 0 => {
                        tracing::warn!(
                            target: "modelpull.download",
                            artifact = %request.artifact_name,
                            offset,
                            reason = %e,
                            "Cannot resume, restarting from the beginning"
                        );
                        self.store.truncate(partial).await?;
                        offset = 0;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let size = self.store.resume_offset(partial).await?;
        if let Some(expected) = expected.or(reported_total) {
            if size != expected {
                return Err(DownloadError::invalid_response(format!(
                    "received {size} bytes but {expected} bytes were expected"
                )));
            }
        }

        let progress = tracker.finish(ProgressSample::now(size, Some(size)));
        self.emit(DownloadState::Downloading { progress }).await?;
        Ok(size)
    }

    // ---------------------------------------------------------------------
    // Split flow
    // ---------------------------------------------------------------------

    async fn download_split(
        &self,
        request: &DownloadRequest,
        part_size: u64,
    ) -> Result<u64, DownloadError> {
        let name = request.artifact_name.as_str();
        let total = request.expected_total_bytes.ok_or_else(|| {
            DownloadError::invalid_request("split downloads require an expected total size")
        })?;
        let parts = plan_parts(total, part_size)?;
        let count = u32::try_from(parts.len()).unwrap_or(u32::MAX);
        let part_paths: Vec<PathBuf> = parts
            .iter()
            .map(|p| self.store.part_path(name, p.index))
            .collect();

        let mut completed_before = 0;
        for (range, path) in parts.iter().zip(&part_paths) {
            let slot = PartSlot {
                range: *range,
                count,
                total,
                completed_before,
            };

            let offset = self
                .store
                .prepare_staging(path, request.resume_enabled, Some(range.len()))
                .await?;
            tracing::debug!(
                target: "modelpull.download",
                artifact = name,
                part = range.index,
                offset,
                len = range.len(),
                "Preparing part"
            );

            let this = self;
            let path_ref = path.as_path();
            self.retry
                .execute(&self.cancel, move |attempt| {
                    this.part_attempt(request, slot, path_ref, attempt)
                })
                .await?;

            completed_before += range.len();
        }

        self.emit(DownloadState::Merging).await?;
        let partial = self.store.partial_path(name);
        let merged = self
            .merger
            .merge(&part_paths, &partial, &self.cancel)
            .await?;
        if merged != total {
            return Err(DownloadError::invalid_response(format!(
                "merged {merged} bytes but {total} bytes were expected"
            )));
        }

        if let Some(digest) = &request.expected_digest {
            self.emit(DownloadState::Verifying).await?;
            if let Err(e) = self.merger.verify(&partial, digest, &self.cancel).await {
                if matches!(e, DownloadError::ChecksumMismatch { .. }) {
                    for part in &part_paths {
                        remove_if_exists(part).await?;
                    }
                }
                return Err(e);
            }
        }

        self.merger
            .finish(&partial, &self.store.final_path(name), &part_paths)
            .await?;
        Ok(total)
    }

    /// One attempt of a part transfer, resuming from the part file length.
    async fn part_attempt(
        &self,
        request: &DownloadRequest,
        slot: PartSlot,
        path: &Path,
        attempt: RetryAttempt,
    ) -> Result<(), DownloadError> {
        let range = slot.range;
        let len = range.len();
        let offset = self.store.prepare_staging(path, true, Some(len)).await?;
        if attempt.attempt_number > 1 {
            tracing::info!(
                target: "modelpull.download",
                artifact = %request.artifact_name,
                part = range.index,
                attempt = attempt.attempt_number,
                offset,
                "Retrying part from staging offset"
            );
        }

        let mut part_tracker = self.tracker();
        let mut overall_tracker = self.tracker();
        part_tracker.set_total(Some(len));
        overall_tracker.set_total(Some(slot.total));
        overall_tracker.update(ProgressSample::now(slot.completed_before + offset, None));

        if offset < len {
            if let Some(progress) = part_tracker.record(ProgressSample::now(offset, None)) {
                let overall = overall_tracker.current();
                self.emit_progress(part_state(slot, progress, overall));
            }

            let mut file = self.store.open_append(path).await?;
            let target = FetchTarget {
                url: &request.source_url,
                range: ByteRange::bounded(range.start + offset, range.end),
                expected_total: Some(slot.total),
            };
            let tx = &self.tx;
            let result = self
                .fetcher
                .fetch(target, &mut file, &self.cancel, &mut |position, _| {
                    let in_part = position.saturating_sub(range.start);
                    overall_tracker
                        .update(ProgressSample::now(slot.completed_before + in_part, None));
                    if let Some(progress) = part_tracker.record(ProgressSample::now(in_part, None))
                    {
                        let overall = overall_tracker.current();
                        let _ = tx.try_send(part_state(slot, progress, overall));
                    }
                })
                .await;
            drop(file);
            result?;

            let size = self.store.resume_offset(path).await?;
            if size != len {
                return Err(DownloadError::invalid_response(format!(
                    "part {} holds {size} bytes but {len} bytes were expected",
                    range.index
                )));
            }
        } else {
            tracing::debug!(
                target: "modelpull.download",
                artifact = %request.artifact_name,
                part = range.index,
                "Part already complete, skipping"
            );
        }

        let progress = part_tracker.finish(ProgressSample::now(len, None));
        let overall = overall_tracker.finish(ProgressSample::now(slot.completed_before + len, None));
        self.emit(part_state(slot, progress, overall)).await
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(self.config.progress_interval, self.config.rate_window)
    }

    /// Send a phase state, waiting for channel capacity.
    async fn emit(&self, state: DownloadState) -> Result<(), DownloadError> {
        tokio::select! {
            biased;

            () = self.cancel.cancelled() => Err(DownloadError::Cancelled),

            sent = self.tx.send(state) => sent.map_err(|_| DownloadError::Cancelled),
        }
    }

    /// Send a progress state if the channel has room.
    fn emit_progress(&self, state: DownloadState) {
        let _ = self.tx.try_send(state);
    }
}

fn part_state(
    slot: PartSlot,
    progress: DownloadProgress,
    overall: DownloadProgress,
) -> DownloadState {
    DownloadState::DownloadingPart {
        index: slot.range.index,
        total: slot.count,
        progress,
        overall,
    }
}
