//! CLI-specific error types and mappings.
//!
//! Maps `DownloadError` and `PathError` to exit codes and user-facing
//! messages.

use modelpull_core::{DownloadError, PathError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Download failed for a reason not covered below.
    #[error("{0}")]
    Download(String),

    /// Argument or request validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// Transient failure; running the same command again resumes.
    #[error("{0}")]
    Temporary(String),

    /// The downloaded bytes did not match the expected digest.
    #[error("{0}")]
    Integrity(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Interrupted by the user.
    #[error("Interrupted; partial download kept for resume")]
    Cancelled,
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    /// - 130: Terminated by Ctrl-C
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Download(_) => 1,
            CliError::Arguments(_) => 2,  // EX_USAGE
            CliError::Integrity(_) => 65, // EX_DATAERR
            CliError::Io(_) => 74,        // EX_IOERR
            CliError::Temporary(_) => 75, // EX_TEMPFAIL
            CliError::Config(_) => 78,    // EX_CONFIG
            CliError::Cancelled => 130,
        }
    }
}

impl From<DownloadError> for CliError {
    fn from(err: DownloadError) -> Self {
        let message = err.user_message();
        match err {
            DownloadError::InvalidRequest { message } => CliError::Arguments(message),
            DownloadError::ChecksumMismatch { .. } => CliError::Integrity(message),
            DownloadError::Storage { .. } => CliError::Io(message),
            DownloadError::Cancelled => CliError::Cancelled,
            ref e if e.is_retryable() => CliError::Temporary(message),
            _ => CliError::Download(message),
        }
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err.to_string())
    }
}
