//! Integration tests for split (multi-part) downloads.
//!
//! Parts are fetched in index order into `<name>.part<N>`, merged into the
//! staging file, optionally verified, and published under the final name.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use modelpull_download::testing::FakeTransport;
use modelpull_download::{DownloadError, DownloadRequest, DownloadState};

use common::{NAME, URL, collect, data, downloader, phases, sha256_hex, terminal, test_config};

fn split_request(total: u64, part_size: u64) -> DownloadRequest {
    DownloadRequest::new(URL, NAME)
        .with_expected_total(total)
        .with_part_size(part_size)
}

fn part_indices(states: &[DownloadState]) -> Vec<u32> {
    let mut indices: Vec<u32> = states
        .iter()
        .filter_map(|s| match s {
            DownloadState::DownloadingPart { index, total, .. } => {
                assert_eq!(*total, 3);
                Some(*index)
            }
            _ => None,
        })
        .collect();
    indices.dedup();
    indices
}

#[tokio::test]
async fn parts_are_fetched_merged_and_verified() {
    let dir = TempDir::new().unwrap();
    let body = data(105);
    let transport = Arc::new(FakeTransport::serving(body.clone()));

    let request = split_request(105, 50).with_digest(sha256_hex(&body));
    let states = collect(downloader(&transport, test_config(dir.path())).start_download(request)).await;

    assert_eq!(
        phases(&states),
        vec![
            "preparing",
            "downloading_part",
            "merging",
            "verifying",
            "completed"
        ]
    );
    assert_eq!(part_indices(&states), vec![0, 1, 2]);
    assert!(matches!(
        terminal(&states),
        DownloadState::Completed { total_bytes: 105, .. }
    ));

    let ranges: Vec<_> = transport
        .requests()
        .into_iter()
        .filter_map(|r| r.range)
        .collect();
    assert_eq!(ranges, vec!["bytes=0-49", "bytes=50-99", "bytes=100-104"]);

    assert_eq!(std::fs::read(dir.path().join(NAME)).unwrap(), body);
    for index in 0..3 {
        assert!(!dir.path().join(format!("model.bin.part{index}")).exists());
    }
    assert!(!dir.path().join("model.bin.partial").exists());
}

#[tokio::test]
async fn overall_progress_reaches_100_before_merge() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(FakeTransport::serving(data(105)));

    let states = collect(downloader(&transport, test_config(dir.path())).start_download(split_request(105, 50))).await;

    let overall: Vec<f64> = states
        .iter()
        .filter_map(DownloadState::progress)
        .map(|p| p.percent)
        .collect();
    assert!(overall.windows(2).all(|w| w[0] <= w[1]), "{overall:?}");

    let merging = states
        .iter()
        .position(|s| matches!(s, DownloadState::Merging))
        .unwrap();
    match &states[merging - 1] {
        DownloadState::DownloadingPart {
            index,
            progress,
            overall,
            ..
        } => {
            assert_eq!(*index, 2);
            assert!((progress.percent - 100.0).abs() < f64::EPSILON);
            assert!((overall.percent - 100.0).abs() < f64::EPSILON);
            assert_eq!(overall.bytes_downloaded, 105);
        }
        other => panic!("Expected DownloadingPart before Merging, got {other:?}"),
    }
}

#[tokio::test]
async fn checksum_mismatch_deletes_output_and_parts() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(FakeTransport::serving(data(105)));

    let request = split_request(105, 50).with_digest(sha256_hex(b"not the payload"));
    let states = collect(downloader(&transport, test_config(dir.path())).start_download(request)).await;

    match terminal(&states) {
        DownloadState::Failed {
            error: DownloadError::ChecksumMismatch { expected, actual },
        } => {
            assert_eq!(expected, &sha256_hex(b"not the payload"));
            assert_eq!(actual, &sha256_hex(&data(105)));
        }
        other => panic!("Expected ChecksumMismatch, got {other:?}"),
    }

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn existing_parts_are_resumed_or_skipped() {
    let dir = TempDir::new().unwrap();
    let body = data(105);
    std::fs::write(dir.path().join("model.bin.part0"), &body[..50]).unwrap();
    std::fs::write(dir.path().join("model.bin.part1"), &body[50..70]).unwrap();
    let transport = Arc::new(FakeTransport::serving(body.clone()));

    let states = collect(downloader(&transport, test_config(dir.path())).start_download(split_request(105, 50))).await;

    assert!(matches!(terminal(&states), DownloadState::Completed { .. }));
    let ranges: Vec<_> = transport
        .requests()
        .into_iter()
        .filter_map(|r| r.range)
        .collect();
    assert_eq!(ranges, vec!["bytes=70-99", "bytes=100-104"]);
    assert_eq!(std::fs::read(dir.path().join(NAME)).unwrap(), body);
}

#[tokio::test]
async fn dropped_part_is_retried_from_its_offset() {
    let dir = TempDir::new().unwrap();
    let body = data(105);
    let transport = Arc::new(FakeTransport::serving(body.clone()).with_drops([30]));

    let states = collect(downloader(&transport, test_config(dir.path())).start_download(split_request(105, 50))).await;

    assert!(matches!(terminal(&states), DownloadState::Completed { .. }));
    let ranges: Vec<_> = transport
        .requests()
        .into_iter()
        .filter_map(|r| r.range)
        .collect();
    assert_eq!(
        ranges,
        vec!["bytes=0-49", "bytes=30-49", "bytes=50-99", "bytes=100-104"]
    );
    assert_eq!(std::fs::read(dir.path().join(NAME)).unwrap(), body);
}

#[tokio::test]
async fn server_ignoring_part_range_is_fatal() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(FakeTransport::serving(data(105)).ignoring_ranges());

    let states = collect(downloader(&transport, test_config(dir.path())).start_download(split_request(105, 50))).await;

    assert!(matches!(
        terminal(&states),
        DownloadState::Failed {
            error: DownloadError::InvalidResponse { .. }
        }
    ));
    assert_eq!(transport.request_count(), 1);
    assert!(!dir.path().join(NAME).exists());
}

#[tokio::test]
async fn chunked_full_body_is_not_written_past_the_part() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        FakeTransport::serving(data(105))
            .ignoring_ranges()
            .without_content_length(),
    );

    let states = collect(downloader(&transport, test_config(dir.path())).start_download(split_request(105, 50))).await;

    assert!(matches!(
        terminal(&states),
        DownloadState::Failed {
            error: DownloadError::InvalidResponse { .. }
        }
    ));
    assert_eq!(transport.request_count(), 1);
    let part0 = std::fs::metadata(dir.path().join("model.bin.part0")).unwrap();
    assert!(part0.len() <= 50, "part 0 holds {} bytes", part0.len());
}

#[tokio::test]
async fn disagreeing_server_size_is_fatal() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(FakeTransport::serving(data(120)));

    let states = collect(downloader(&transport, test_config(dir.path())).start_download(split_request(105, 50))).await;

    assert!(matches!(
        terminal(&states),
        DownloadState::Failed {
            error: DownloadError::InvalidResponse { .. }
        }
    ));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn single_part_when_part_size_exceeds_total() {
    let dir = TempDir::new().unwrap();
    let body = data(40);
    let transport = Arc::new(FakeTransport::serving(body.clone()));

    let states = collect(downloader(&transport, test_config(dir.path())).start_download(split_request(40, 1000))).await;

    assert!(matches!(terminal(&states), DownloadState::Completed { total_bytes: 40, .. }));
    assert_eq!(transport.requests()[0].range.as_deref(), Some("bytes=0-39"));
    assert_eq!(std::fs::read(dir.path().join(NAME)).unwrap(), body);
}
