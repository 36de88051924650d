//! CLI bootstrap: turns global flags and the environment into a `Downloader`.

use std::sync::Arc;
use std::time::Duration;

use modelpull_core::{DownloadConfig, DownloadDirResolution, HttpTransport, resolve_download_dir};
use modelpull_download::{Downloader, ReqwestTransport};

use crate::error::CliError;
use crate::parser::Cli;

/// Everything a handler needs.
pub struct CliContext {
    /// The configured downloader.
    pub downloader: Downloader,
    /// Where artifacts go and how that was decided.
    pub download_dir: DownloadDirResolution,
}

/// Build the download configuration from global flags.
pub fn build_config(cli: &Cli, download_dir: &DownloadDirResolution) -> DownloadConfig {
    let mut config =
        DownloadConfig::new(download_dir.path.clone()).with_auth_token(cli.token.clone());
    if let Some(attempts) = cli.max_attempts {
        config = config.with_max_attempts(attempts);
    }
    if let Some(ms) = cli.retry_base_ms {
        config = config.with_base_delay(Duration::from_millis(ms));
    }
    config
}

/// Resolve the download directory and wire the reqwest transport.
pub fn bootstrap(cli: &Cli) -> Result<CliContext, CliError> {
    let download_dir = resolve_download_dir(cli.dir.as_deref())?;
    let config = build_config(cli, &download_dir);

    tracing::debug!(
        dir = %download_dir.path.display(),
        source = ?download_dir.source,
        max_attempts = config.max_attempts,
        "Bootstrapping downloader"
    );

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(&config).map_err(|e| CliError::Config(e.to_string()))?);

    Ok(CliContext {
        downloader: Downloader::new(transport, config),
        download_dir,
    })
}
