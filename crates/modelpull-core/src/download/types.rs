//! Download request and part planning types.

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;

/// Suffix of the whole-file (and merge) staging file.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Suffix prefix of split staging files (`<name>.part<N>`).
pub const PART_SUFFIX: &str = ".part";

/// Request to download one artifact.
///
/// This is a pure data structure; it is validated and then treated as
/// immutable for the lifetime of the download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source URL of the artifact.
    pub source_url: String,
    /// File name of the artifact inside the download directory.
    pub artifact_name: String,
    /// Continue from an existing staging file instead of starting over.
    pub resume_enabled: bool,
    /// Split the transfer into ranges of this size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_size_bytes: Option<u64>,
    /// Size of the artifact, if known up front. Required for split downloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_total_bytes: Option<u64>,
    /// Expected SHA-256 of the final artifact (hex, optionally `sha256:`-prefixed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_digest: Option<String>,
}

impl DownloadRequest {
    /// Create a new whole-file request with resume enabled.
    pub fn new(source_url: impl Into<String>, artifact_name: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            artifact_name: artifact_name.into(),
            resume_enabled: true,
            part_size_bytes: None,
            expected_total_bytes: None,
            expected_digest: None,
        }
    }

    /// Enable or disable resuming from an existing staging file.
    #[must_use]
    pub const fn with_resume(mut self, resume_enabled: bool) -> Self {
        self.resume_enabled = resume_enabled;
        self
    }

    /// Split the download into parts of `part_size` bytes.
    #[must_use]
    pub const fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size_bytes = Some(part_size);
        self
    }

    /// Declare the expected artifact size.
    #[must_use]
    pub const fn with_expected_total(mut self, total: u64) -> Self {
        self.expected_total_bytes = Some(total);
        self
    }

    /// Verify the final artifact against a SHA-256 digest.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.expected_digest = Some(digest.into());
        self
    }

    /// Whether this request is a split (multi-part) download.
    pub const fn is_split(&self) -> bool {
        self.part_size_bytes.is_some()
    }

    /// Validate the request. Performs no I/O.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.source_url.trim().is_empty() {
            return Err(DownloadError::invalid_request("source URL is empty"));
        }
        validate_artifact_name(&self.artifact_name)?;

        if self.expected_total_bytes == Some(0) {
            return Err(DownloadError::invalid_request(
                "expected total size must be greater than zero",
            ));
        }

        if let Some(part_size) = self.part_size_bytes {
            let total = self.expected_total_bytes.ok_or_else(|| {
                DownloadError::invalid_request("split downloads require an expected total size")
            })?;
            plan_parts(total, part_size)?;
        }

        if let Some(digest) = &self.expected_digest {
            normalize_digest(digest)?;
        }

        Ok(())
    }
}

/// Reject names that would escape the download directory or collide with
/// the reserved staging suffixes.
pub fn validate_artifact_name(name: &str) -> Result<(), DownloadError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(DownloadError::invalid_request(format!(
            "invalid artifact name '{name}'"
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(DownloadError::invalid_request(format!(
            "artifact name '{name}' must not contain path separators"
        )));
    }
    if is_staging_name(name) {
        return Err(DownloadError::invalid_request(format!(
            "artifact name '{name}' uses a reserved staging suffix"
        )));
    }
    Ok(())
}

/// Whether `file_name` looks like a staging file (`.partial` or `.part<N>`).
pub fn is_staging_name(file_name: &str) -> bool {
    staging_base(file_name).is_some()
}

/// Split a staging file name into its artifact name and part index.
///
/// `model.bin.partial` → `("model.bin", None)`,
/// `model.bin.part3` → `("model.bin", Some(3))`.
pub fn staging_base(file_name: &str) -> Option<(&str, Option<u32>)> {
    if let Some(base) = file_name.strip_suffix(PARTIAL_SUFFIX) {
        return (!base.is_empty()).then_some((base, None));
    }
    let idx = file_name.rfind(PART_SUFFIX)?;
    let (base, suffix) = file_name.split_at(idx);
    let digits = &suffix[PART_SUFFIX.len()..];
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|index| (base, Some(index)))
}

/// Normalize an expected digest to lowercase hex without prefix.
pub fn normalize_digest(digest: &str) -> Result<String, DownloadError> {
    let trimmed = digest.trim();
    let hex = trimmed
        .strip_prefix("sha256:")
        .or_else(|| trimmed.strip_prefix("SHA256:"))
        .unwrap_or(trimmed);

    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DownloadError::invalid_request(format!(
            "expected digest '{digest}' is not a SHA-256 hex string"
        )));
    }
    Ok(hex.to_ascii_lowercase())
}

/// One byte range of a split download (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRange {
    /// Zero-based part index.
    pub index: u32,
    /// First byte of the range.
    pub start: u64,
    /// Last byte of the range (inclusive).
    pub end: u64,
}

impl PartRange {
    /// Number of bytes in this range.
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges always hold at least one byte.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Compute the part ranges for a split download.
///
/// Part count is `ceil(total / part_size)`; the last part ends at `total - 1`.
pub fn plan_parts(total: u64, part_size: u64) -> Result<Vec<PartRange>, DownloadError> {
    if total == 0 {
        return Err(DownloadError::invalid_request(
            "total size must be greater than zero",
        ));
    }
    if part_size == 0 {
        return Err(DownloadError::invalid_request(
            "part size must be greater than zero",
        ));
    }

    let count = total.div_ceil(part_size);
    let count = u32::try_from(count).map_err(|_| {
        DownloadError::invalid_request(format!(
            "part size {part_size} splits {total} bytes into too many parts"
        ))
    })?;

    Ok((0..count)
        .map(|index| {
            let start = u64::from(index) * part_size;
            let end = (start + part_size - 1).min(total - 1);
            PartRange { index, start, end }
        })
        .collect())
}
