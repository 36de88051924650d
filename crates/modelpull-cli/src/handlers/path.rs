//! Path command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the path command.
///
/// # Errors
///
/// Fails when the artifact has not been downloaded.
pub async fn execute(ctx: &CliContext, name: &str) -> Result<()> {
    match ctx.downloader.artifact_path(name).await {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(CliError::Download(format!("'{name}' is not downloaded")).into()),
    }
}
