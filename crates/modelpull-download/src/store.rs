//! On-disk layout of artifacts and staging files.
//!
//! ```text
//! <download_dir>/<name>           final artifact
//! <download_dir>/<name>.partial   whole-file staging, also the merge output
//! <download_dir>/<name>.part<N>   staging for part N of a split download
//! ```
//!
//! The length of a staging file is the resume offset; nothing else is persisted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};

use modelpull_core::DownloadError;
use modelpull_core::download::{PART_SUFFIX, PARTIAL_SUFFIX, staging_base, validate_artifact_name};

use crate::merger::remove_if_exists;

/// A staging file left behind by an unfinished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifact {
    /// Artifact the staging file belongs to.
    pub artifact_name: String,
    /// Part index for `.part<N>` files, `None` for `.partial`.
    pub part_index: Option<u32>,
    /// Full path of the staging file.
    pub path: PathBuf,
    /// Bytes already on disk.
    pub bytes: u64,
}

/// Resolves and inspects paths inside the download directory.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    download_dir: PathBuf,
}

impl ResumeStore {
    /// Create a store rooted at `download_dir`.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    /// Ensure the download directory exists, creating it if necessary.
    pub async fn ensure_dir(&self) -> Result<(), DownloadError> {
        fs::create_dir_all(&self.download_dir).await.map_err(|e| {
            DownloadError::storage(format!("create_dir {}", self.download_dir.display()), &e)
        })
    }

    /// Path of the final artifact.
    pub fn final_path(&self, name: &str) -> PathBuf {
        self.download_dir.join(name)
    }

    /// Path of the whole-file staging file.
    pub fn partial_path(&self, name: &str) -> PathBuf {
        self.download_dir.join(format!("{name}{PARTIAL_SUFFIX}"))
    }

    /// Path of the staging file for part `index`.
    pub fn part_path(&self, name: &str, index: u32) -> PathBuf {
        self.download_dir.join(format!("{name}{PART_SUFFIX}{index}"))
    }

    /// Length of `path`, or 0 if it does not exist.
    pub async fn resume_offset(&self, path: &Path) -> Result<u64, DownloadError> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(DownloadError::storage(format!("stat {}", path.display()), &e)),
        }
    }

    /// Prepare a staging file for the next fetch and return its resume offset.
    ///
    /// Without `resume` the file is recreated empty. With a `limit`, a file
    /// longer than the limit cannot be a prefix of the resource and is
    /// recreated empty as well.
    pub async fn prepare_staging(
        &self,
        path: &Path,
        resume: bool,
        limit: Option<u64>,
    ) -> Result<u64, DownloadError> {
        if !resume {
            self.truncate(path).await?;
            return Ok(0);
        }

        let offset = self.resume_offset(path).await?;
        if let Some(limit) = limit.filter(|&limit| offset > limit) {
            tracing::warn!(
                target: "modelpull.download",
                path = %path.display(),
                offset,
                limit,
                "Staging file is longer than expected, restarting"
            );
            self.truncate(path).await?;
            return Ok(0);
        }
        Ok(offset)
    }

    /// Recreate `path` as an empty file.
    pub async fn truncate(&self, path: &Path) -> Result<(), DownloadError> {
        File::create(path)
            .await
            .map(drop)
            .map_err(|e| DownloadError::storage(format!("truncate {}", path.display()), &e))
    }

    /// Open `path` for appending, creating it if needed.
    pub async fn open_append(&self, path: &Path) -> Result<File, DownloadError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| DownloadError::storage(format!("open {}", path.display()), &e))
    }

    /// Whether `path` exists as a regular file.
    pub async fn is_file(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok_and(|m| m.is_file())
    }

    /// Whether the final artifact exists.
    pub async fn is_downloaded(&self, name: &str) -> bool {
        validate_artifact_name(name).is_ok() && self.is_file(&self.final_path(name)).await
    }

    /// Path of the final artifact, if it exists.
    pub async fn artifact_path(&self, name: &str) -> Option<PathBuf> {
        if !self.is_downloaded(name).await {
            return None;
        }
        Some(self.final_path(name))
    }

    /// Delete the final artifact and every staging file of `name`.
    ///
    /// Returns whether the final artifact existed.
    pub async fn delete_artifact(&self, name: &str) -> Result<bool, DownloadError> {
        validate_artifact_name(name)?;

        for staging in self.staging_files(name).await? {
            remove_if_exists(&staging.path).await?;
        }
        let existed = remove_if_exists(&self.final_path(name)).await?;

        tracing::info!(
            target: "modelpull.download",
            artifact = name,
            existed,
            "Deleted artifact"
        );
        Ok(existed)
    }

    /// Staging files belonging to `name`.
    pub async fn staging_files(&self, name: &str) -> Result<Vec<PendingArtifact>, DownloadError> {
        Ok(self
            .pending()
            .await?
            .into_iter()
            .filter(|p| p.artifact_name == name)
            .collect())
    }

    /// Every staging file in the download directory, ordered by artifact
    /// name and part index.
    pub async fn pending(&self) -> Result<Vec<PendingArtifact>, DownloadError> {
        let mut entries = match fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DownloadError::storage(
                    format!("read_dir {}", self.download_dir.display()),
                    &e,
                ));
            }
        };

        let mut pending = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(DownloadError::storage(
                        format!("read_dir {}", self.download_dir.display()),
                        &e,
                    ));
                }
            };

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some((base, part_index)) = staging_base(file_name) else {
                continue;
            };
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }

            pending.push(PendingArtifact {
                artifact_name: base.to_string(),
                part_index,
                path: entry.path(),
                bytes: meta.len(),
            });
        }

        pending.sort_by(|a, b| {
            a.artifact_name
                .cmp(&b.artifact_name)
                .then(a.part_index.cmp(&b.part_index))
        });
        Ok(pending)
    }
}
