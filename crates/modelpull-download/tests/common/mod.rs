//! Common test utilities.
//!
//! Shared fixtures for driving a `Downloader` against the scripted
//! `FakeTransport` in a temporary directory.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use modelpull_download::testing::FakeTransport;
use modelpull_download::{DownloadConfig, DownloadHandle, DownloadState, Downloader};

pub const URL: &str = "https://host/model.bin";
pub const NAME: &str = "model.bin";

/// Deterministic, non-repeating-looking payload.
pub fn data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Fast retries, short timeouts, default throttling.
pub fn test_config(dir: &Path) -> DownloadConfig {
    DownloadConfig::new(dir)
        .with_max_attempts(5)
        .with_base_delay(Duration::from_millis(1))
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(5))
}

pub fn downloader(transport: &Arc<FakeTransport>, config: DownloadConfig) -> Downloader {
    Downloader::new(transport.clone(), config)
}

/// Drain a handle into the list of states it published.
pub async fn collect(mut handle: DownloadHandle) -> Vec<DownloadState> {
    let mut states = Vec::new();
    let drained = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(state) = handle.next().await {
            states.push(state);
        }
    })
    .await;
    assert!(drained.is_ok(), "download did not finish: {states:?}");
    states
}

/// State labels with consecutive duplicates collapsed.
pub fn phases(states: &[DownloadState]) -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = states.iter().map(DownloadState::label).collect();
    labels.dedup();
    labels
}

pub fn terminal(states: &[DownloadState]) -> &DownloadState {
    let last = states.last().expect("no states published");
    assert!(last.is_terminal(), "last state is not terminal: {last:?}");
    last
}
