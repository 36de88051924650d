//! Get command handler.
//!
//! Starts a download, renders its states, and maps the outcome to an exit
//! code. Ctrl-C cancels the download and keeps the staging files so the
//! same command resumes later.

use std::io::IsTerminal;

use anyhow::Result;
use modelpull_core::{DownloadRequest, DownloadState};

use crate::bootstrap::CliContext;
use crate::commands::GetArgs;
use crate::error::CliError;
use crate::presentation::DownloadBar;
use crate::utils::artifact_name_from_url;

/// Build the download request from command arguments.
pub fn build_request(args: &GetArgs) -> Result<DownloadRequest, CliError> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => artifact_name_from_url(&args.url).ok_or_else(|| {
            CliError::Arguments(format!(
                "cannot derive a file name from '{}'; pass --name",
                args.url
            ))
        })?,
    };

    let mut request = DownloadRequest::new(args.url.clone(), name).with_resume(!args.no_resume);
    if let Some(total) = args.size {
        request = request.with_expected_total(total);
    }
    if let Some(part_size) = args.part_size {
        request = request.with_part_size(part_size);
    }
    if let Some(digest) = &args.sha256 {
        request = request.with_digest(digest.clone());
    }
    Ok(request)
}

/// Execute the get command.
///
/// Prints the final path on success.
///
/// # Errors
///
/// Returns a `CliError` when the download fails or is interrupted.
pub async fn execute(ctx: &CliContext, args: &GetArgs) -> Result<()> {
    let request = build_request(args)?;
    let mut bar = if std::io::stderr().is_terminal() {
        DownloadBar::new(&request.artifact_name)
    } else {
        DownloadBar::hidden(&request.artifact_name)
    };

    tracing::debug!(
        url = %request.source_url,
        name = %request.artifact_name,
        dir = %ctx.download_dir.path.display(),
        "Starting download"
    );
    let mut handle = ctx.downloader.start_download(request);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut watch_signal = true;

    loop {
        tokio::select! {
            state = handle.next() => {
                let Some(state) = state else {
                    bar.abandon("download stopped");
                    return Err(CliError::Cancelled.into());
                };
                bar.apply(&state);
                match state {
                    DownloadState::Completed { path, .. } => {
                        println!("{}", path.display());
                        return Ok(());
                    }
                    DownloadState::Failed { error } => {
                        return Err(CliError::from(error).into());
                    }
                    _ => {}
                }
            }
            signal = &mut ctrl_c, if watch_signal => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
                    watch_signal = false;
                    continue;
                }
                handle.cancel();
                while handle.next().await.is_some() {}
                bar.abandon("interrupted");
                tracing::info!(name = %handle.artifact_name(), "Download interrupted; run again to resume");
                return Err(CliError::Cancelled.into());
            }
        }
    }
}
