//! Remove command handler.
//!
//! Deletes the final artifact and every staging file for it.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the rm command.
pub async fn execute(ctx: &CliContext, name: &str) -> Result<()> {
    let staged = ctx
        .downloader
        .pending_artifacts()
        .await
        .map_err(CliError::from)?
        .into_iter()
        .filter(|p| p.artifact_name == name)
        .count();
    let removed = ctx
        .downloader
        .delete_artifact(name)
        .await
        .map_err(CliError::from)?;

    match (removed, staged) {
        (false, 0) => println!("Nothing to remove for '{name}'"),
        (true, 0) => println!("Removed '{name}'"),
        (_, n) => println!("Removed '{name}' and {n} staging file(s)"),
    }
    Ok(())
}
