//! Part merging, digest verification, and atomic publication.
//!
//! Parts are only ever read here. The merged output is written to the
//! artifact's staging file and becomes visible under the final name through a
//! single rename, so an interrupted merge can simply be redone from scratch.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use modelpull_core::DownloadError;
use modelpull_core::download::normalize_digest;

/// Copy and hash buffer size.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Concatenates parts and verifies the result.
#[derive(Debug, Clone)]
pub struct PartMerger {
    chunk_size: usize,
}

impl Default for PartMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl PartMerger {
    /// Create a merger using 1 MiB chunks.
    pub const fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Concatenate `parts` in order into `output`, replacing its contents.
    ///
    /// Returns the number of bytes written.
    pub async fn merge(
        &self,
        parts: &[PathBuf],
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let mut out = File::create(output)
            .await
            .map_err(|e| DownloadError::storage(format!("create {}", output.display()), &e))?;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        for part in parts {
            let mut input = File::open(part)
                .await
                .map_err(|e| DownloadError::storage(format!("open {}", part.display()), &e))?;

            loop {
                if cancel.is_cancelled() {
                    return Err(DownloadError::Cancelled);
                }
                let n = input
                    .read(&mut buffer)
                    .await
                    .map_err(|e| DownloadError::storage(format!("read {}", part.display()), &e))?;
                if n == 0 {
                    break;
                }
                out.write_all(&buffer[..n])
                    .await
                    .map_err(|e| DownloadError::storage(format!("write {}", output.display()), &e))?;
                written += n as u64;
            }
        }

        out.flush()
            .await
            .map_err(|e| DownloadError::storage(format!("flush {}", output.display()), &e))?;
        out.sync_all()
            .await
            .map_err(|e| DownloadError::storage(format!("sync {}", output.display()), &e))?;

        tracing::debug!(
            target: "modelpull.download",
            output = %output.display(),
            parts = parts.len(),
            bytes = written,
            "Merged parts"
        );
        Ok(written)
    }

    /// Compute the lowercase hex SHA-256 of `path`.
    pub async fn sha256(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, DownloadError> {
        let mut file = File::open(path)
            .await
            .map_err(|e| DownloadError::storage(format!("open {}", path.display()), &e))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| DownloadError::storage(format!("read {}", path.display()), &e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Check `path` against `expected`; on mismatch the file is deleted.
    pub async fn verify(
        &self,
        path: &Path,
        expected: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let expected = normalize_digest(expected)?;
        let actual = self.sha256(path, cancel).await?;
        if actual == expected {
            tracing::debug!(target: "modelpull.download", path = %path.display(), "Checksum verified");
            return Ok(());
        }

        tracing::warn!(
            target: "modelpull.download",
            path = %path.display(),
            %expected,
            %actual,
            "Checksum mismatch, deleting output"
        );
        remove_if_exists(path).await?;
        Err(DownloadError::checksum_mismatch(expected, actual))
    }

    /// Publish `staging` under `final_path` and delete the parts.
    pub async fn finish(
        &self,
        staging: &Path,
        final_path: &Path,
        parts: &[PathBuf],
    ) -> Result<(), DownloadError> {
        fs::rename(staging, final_path).await.map_err(|e| {
            DownloadError::storage(
                format!("rename {} to {}", staging.display(), final_path.display()),
                &e,
            )
        })?;
        for part in parts {
            remove_if_exists(part).await?;
        }
        Ok(())
    }
}

/// Delete a file, treating "already gone" as success.
///
/// Returns whether a file was removed.
pub async fn remove_if_exists(path: &Path) -> Result<bool, DownloadError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DownloadError::storage(
            format!("delete {}", path.display()),
            &e,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    // sha256("hello world")
    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    async fn write_parts(dir: &TempDir, chunks: &[&[u8]]) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let path = dir.path().join(format!("model.bin.part{i}"));
            fs::write(&path, chunk).await.unwrap();
            paths.push(path);
        }
        paths
    }

    #[tokio::test]
    async fn merges_parts_in_order() {
        let dir = TempDir::new().unwrap();
        let parts = write_parts(&dir, &[b"hello", b" ", b"world"]).await;
        let output = dir.path().join("model.bin.partial");

        let merger = PartMerger::new();
        let written = merger
            .merge(&parts, &output, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(fs::read(&output).await.unwrap(), b"hello world");
        // Parts are untouched by the merge.
        for part in &parts {
            assert!(part.exists());
        }
    }

    #[tokio::test]
    async fn remerge_replaces_previous_output() {
        let dir = TempDir::new().unwrap();
        let parts = write_parts(&dir, &[b"ab", b"cd"]).await;
        let output = dir.path().join("model.bin.partial");
        fs::write(&output, b"leftover from a killed merge").await.unwrap();

        PartMerger::new()
            .merge(&parts, &output, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fs::read(&output).await.unwrap(), b"abcd");
    }

    #[tokio::test]
    async fn verify_accepts_prefixed_uppercase_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin.partial");
        fs::write(&path, b"hello world").await.unwrap();

        let expected = format!("sha256:{}", HELLO_WORLD.to_uppercase());
        PartMerger::new()
            .verify(&path, &expected, &CancellationToken::new())
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn verify_mismatch_deletes_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin.partial");
        fs::write(&path, b"hello wordl").await.unwrap();

        let err = PartMerger::new()
            .verify(&path, HELLO_WORLD, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            DownloadError::ChecksumMismatch { expected, actual } => {
                assert_eq!(expected, HELLO_WORLD);
                assert_ne!(actual, HELLO_WORLD);
            }
            other => panic!("Expected ChecksumMismatch, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn finish_renames_and_removes_parts() {
        let dir = TempDir::new().unwrap();
        let parts = write_parts(&dir, &[b"x", b"y"]).await;
        let staging = dir.path().join("model.bin.partial");
        let final_path = dir.path().join("model.bin");
        fs::write(&staging, b"xy").await.unwrap();

        PartMerger::new()
            .finish(&staging, &final_path, &parts)
            .await
            .unwrap();

        assert_eq!(fs::read(&final_path).await.unwrap(), b"xy");
        assert!(!staging.exists());
        assert!(parts.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn cancelled_merge_stops() {
        let dir = TempDir::new().unwrap();
        let parts = write_parts(&dir, &[b"data"]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = PartMerger::new()
            .merge(&parts, &dir.path().join("out"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, DownloadError::Cancelled);
    }

    #[tokio::test]
    async fn remove_if_exists_reports_presence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone");
        assert!(!remove_if_exists(&path).await.unwrap());
        fs::write(&path, b"x").await.unwrap();
        assert!(remove_if_exists(&path).await.unwrap());
    }
}
