//! Download directory resolution.
//!
//! Provides utilities for resolving the download directory from explicit
//! paths, environment variables, or platform defaults.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable overriding the download directory.
pub const DOWNLOAD_DIR_ENV: &str = "MODELPULL_DIR";

/// Location of the default download directory below the platform data dir.
pub const DEFAULT_DOWNLOAD_DIR_RELATIVE: &str = "modelpull/artifacts";

/// Errors from path resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// No platform data directory could be determined.
    #[error("Could not determine the platform data directory")]
    NoDataDir,

    /// A `~`-prefixed path was given but no home directory exists.
    #[error("Could not determine the home directory to expand '{0}'")]
    NoHomeDir(String),
}

/// How the download directory was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadDirSource {
    /// The user passed an explicit path (CLI flag).
    Explicit,
    /// The path came from `MODELPULL_DIR` (environment or `.env`).
    EnvVar,
    /// Platform default.
    Default,
}

/// Resolution result for the download directory.
#[derive(Debug, Clone)]
pub struct DownloadDirResolution {
    /// The resolved directory.
    pub path: PathBuf,
    /// How the path was determined.
    pub source: DownloadDirSource,
}

/// Return the platform-specific default download directory.
pub fn default_download_dir() -> Result<PathBuf, PathError> {
    let data = dirs::data_dir().ok_or(PathError::NoDataDir)?;
    Ok(data.join(DEFAULT_DOWNLOAD_DIR_RELATIVE))
}

/// Resolve the download directory.
///
/// Resolution order:
/// 1. Explicit path provided by caller (highest priority)
/// 2. `MODELPULL_DIR` environment variable
/// 3. Platform default (`<data dir>/modelpull/artifacts`)
pub fn resolve_download_dir(explicit: Option<&str>) -> Result<DownloadDirResolution, PathError> {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return Ok(DownloadDirResolution {
            path: expand_home(path)?,
            source: DownloadDirSource::Explicit,
        });
    }

    if let Ok(env_path) = env::var(DOWNLOAD_DIR_ENV) {
        if !env_path.trim().is_empty() {
            return Ok(DownloadDirResolution {
                path: expand_home(&env_path)?,
                source: DownloadDirSource::EnvVar,
            });
        }
    }

    Ok(DownloadDirResolution {
        path: default_download_dir()?,
        source: DownloadDirSource::Default,
    })
}

fn expand_home(path: &str) -> Result<PathBuf, PathError> {
    let path = path.trim();
    if path == "~" {
        return dirs::home_dir().ok_or_else(|| PathError::NoHomeDir(path.to_string()));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| PathError::NoHomeDir(path.to_string()))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(path))
}
