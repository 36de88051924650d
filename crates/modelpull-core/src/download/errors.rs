//! Download error types.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error` or `reqwest::Error`. For I/O errors, we
//! capture the kind and message as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for download operations.
///
/// Every failure inside the downloader is classified into one of these
/// variants before it reaches the coordinator, which maps it to a terminal
/// `DownloadState::Failed`.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadError {
    /// Transport-level failure: connection refused/reset, timeout, truncated body.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
    },

    /// The server answered with a status code the fetcher cannot accept.
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Detailed error message.
        message: String,
    },

    /// Local storage failure (disk full, permission denied, ...).
    #[error("Storage error ({kind}): {message}")]
    Storage {
        /// The kind of I/O error (e.g., "`StorageFull`", "`PermissionDenied`").
        kind: String,
        /// Detailed error message, including the failing operation.
        message: String,
    },

    /// Integrity check failed. The mismatched output has been deleted.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected SHA-256 digest (lowercase hex).
        expected: String,
        /// Actual SHA-256 digest computed.
        actual: String,
    },

    /// The request itself is malformed. Raised before any I/O.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What is wrong with the request.
        message: String,
    },

    /// The server response is structurally wrong (bad `Content-Range`,
    /// size disagreement, body longer than the requested span).
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Detailed error message.
        message: String,
    },

    /// The server ignored a resume `Range` and sent the whole resource.
    #[error("Server ignored the Range header and sent the full resource")]
    RangeIgnored,

    /// The staging file is longer than the resource the server now reports
    /// (416 with a smaller complete length). Resuming cannot succeed.
    #[error("Resume offset {offset} is past the end of the {total}-byte resource")]
    ResumePastEnd {
        /// Length of the staging file.
        offset: u64,
        /// Complete length reported by the server.
        total: u64,
    },

    /// Download was cancelled.
    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an HTTP status error.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            message: message.into(),
        }
    }

    /// Create a storage error from a `std::io::Error`.
    ///
    /// `context` names the operation and path, e.g. `"open /models/x.partial"`.
    pub fn storage(context: impl AsRef<str>, err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Storage {
            kind: format!("{kind:?}"),
            message: format!("{}: {err}", context.as_ref()),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ChecksumMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Check if a retry of the same attempt may succeed.
    ///
    /// Transport failures, 5xx and 429 are retryable; every other failure
    /// is fatal for the invocation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || (*status >= 500 && *status < 600),
            _ => false,
        }
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { message } => {
                format!("Network error: {message}. Run the download again to resume.")
            }
            Self::HttpStatus { status, message } => {
                format!("The server refused the download (HTTP {status}): {message}")
            }
            Self::Storage { message, .. } => format!("File operation failed: {message}"),
            Self::ChecksumMismatch { .. } => {
                "File integrity check failed. The corrupted download was deleted.".to_string()
            }
            Self::InvalidRequest { message } => format!("Invalid download request: {message}"),
            Self::InvalidResponse { message } => {
                format!("The server sent an unexpected response: {message}")
            }
            Self::RangeIgnored => {
                "The server does not support resuming; the download restarted.".to_string()
            }
            Self::ResumePastEnd { offset, total } => format!(
                "The partial download ({offset} bytes) is longer than the file on the server ({total} bytes); the download restarted."
            ),
            Self::Cancelled => "Download was cancelled.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DownloadError::storage("open /tmp/x.partial", &io_err);

        match err {
            DownloadError::Storage { kind, message } => {
                assert_eq!(kind, "PermissionDenied");
                assert!(message.contains("/tmp/x.partial"));
                assert!(message.contains("denied"));
            }
            _ => panic!("Expected Storage variant"),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DownloadError::network("reset").is_retryable());
        assert!(DownloadError::http_status(500, "boom").is_retryable());
        assert!(DownloadError::http_status(503, "busy").is_retryable());
        assert!(DownloadError::http_status(429, "slow down").is_retryable());

        assert!(!DownloadError::http_status(404, "missing").is_retryable());
        assert!(!DownloadError::http_status(403, "forbidden").is_retryable());
        assert!(!DownloadError::checksum_mismatch("a", "b").is_retryable());
        assert!(!DownloadError::invalid_request("bad").is_retryable());
        assert!(!DownloadError::Cancelled.is_retryable());
        assert!(!DownloadError::RangeIgnored.is_retryable());
        assert!(
            !DownloadError::ResumePastEnd {
                offset: 80,
                total: 64
            }
            .is_retryable()
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::StorageFull, "full");
        assert!(!DownloadError::storage("write", &io_err).is_retryable());
    }

    #[test]
    fn test_error_serialization() {
        let err = DownloadError::http_status(503, "unavailable");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("503"));
        assert!(json.contains("http_status"));

        let parsed: DownloadError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_user_messages() {
        let err = DownloadError::http_status(404, "Not Found");
        assert!(err.user_message().contains("404"));

        let err = DownloadError::checksum_mismatch("aa", "bb");
        assert!(err.user_message().contains("deleted"));
    }
}
