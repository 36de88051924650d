//! Download coordination.
//!
//! `Downloader` is the entry point: it spawns one worker task per request
//! and hands back a `DownloadHandle` that streams the worker's
//! `DownloadState`s.
//!
//! ```text
//! Downloader::start_download ──spawn──> Worker ──mpsc──> DownloadHandle (Stream)
//!                                          ^                    │
//!                                          └── CancellationToken┘
//! ```

mod worker;

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use modelpull_core::{DownloadConfig, DownloadError, DownloadRequest, DownloadState, HttpTransport};

use crate::fetcher::RangeFetcher;
use crate::merger::{PartMerger, remove_if_exists};
use crate::retry::RetryPolicy;
use crate::store::{PendingArtifact, ResumeStore};

use worker::Worker;

/// Resumable, split, retrying downloader.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn HttpTransport>,
    config: DownloadConfig,
    store: ResumeStore,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Create a downloader over an injected transport.
    pub fn new(transport: Arc<dyn HttpTransport>, config: DownloadConfig) -> Self {
        let store = ResumeStore::new(config.download_dir.clone());
        Self {
            transport,
            config,
            store,
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Start downloading `request` in a background task.
    ///
    /// Must be called from within a tokio runtime. An invalid request yields
    /// a single `Failed` state without touching the network.
    pub fn start_download(&self, request: DownloadRequest) -> DownloadHandle {
        let (tx, rx) = mpsc::channel(self.config.state_channel_capacity.max(1));
        let cancel = CancellationToken::new();

        let worker = Worker {
            fetcher: RangeFetcher::new(
                Arc::clone(&self.transport),
                self.config.buffer_size,
                self.config.read_timeout,
            ),
            retry: RetryPolicy::new(self.config.max_attempts, self.config.base_delay),
            merger: PartMerger::new(),
            store: self.store.clone(),
            config: self.config.clone(),
            tx,
            cancel: cancel.clone(),
        };

        let artifact_name = request.artifact_name.clone();
        tokio::spawn(worker.run(request));

        DownloadHandle {
            artifact_name,
            store: self.store.clone(),
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Whether the final artifact `name` exists.
    pub async fn is_downloaded(&self, name: &str) -> bool {
        self.store.is_downloaded(name).await
    }

    /// Path of the final artifact `name`, if it exists.
    pub async fn artifact_path(&self, name: &str) -> Option<PathBuf> {
        self.store.artifact_path(name).await
    }

    /// Delete the final artifact and its staging files.
    ///
    /// Returns whether the final artifact existed.
    pub async fn delete_artifact(&self, name: &str) -> Result<bool, DownloadError> {
        self.store.delete_artifact(name).await
    }

    /// Staging files currently on disk.
    pub async fn pending_artifacts(&self) -> Result<Vec<PendingArtifact>, DownloadError> {
        self.store.pending().await
    }
}

/// Stream of states for one download.
///
/// Dropping the handle cancels the download.
#[derive(Debug)]
pub struct DownloadHandle {
    artifact_name: String,
    store: ResumeStore,
    rx: mpsc::Receiver<DownloadState>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl DownloadHandle {
    /// Artifact this handle downloads.
    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    /// Next state, or `None` once the download has ended.
    pub async fn next(&mut self) -> Option<DownloadState> {
        self.rx.recv().await
    }

    /// Cancel the download, keeping staging files for a later resume.
    ///
    /// The stream ends without a terminal state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the download, wait for the worker to stop, and delete its
    /// staging files.
    pub async fn cancel_and_discard(mut self) -> Result<(), DownloadError> {
        self.cancel.cancel();
        while self.rx.recv().await.is_some() {}

        for staging in self.store.staging_files(&self.artifact_name).await? {
            remove_if_exists(&staging.path).await?;
        }
        tracing::info!(
            target: "modelpull.download",
            artifact = %self.artifact_name,
            "Download cancelled and staging files discarded"
        );
        Ok(())
    }

    /// Drain the stream and return the terminal state, if any.
    pub async fn wait(mut self) -> Option<DownloadState> {
        let mut last = None;
        while let Some(state) = self.rx.recv().await {
            last = Some(state);
        }
        last.filter(DownloadState::is_terminal)
    }
}

impl Stream for DownloadHandle {
    type Item = DownloadState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
