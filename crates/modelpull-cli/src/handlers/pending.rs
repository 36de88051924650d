//! Pending command handler.

use anyhow::Result;
use indicatif::HumanBytes;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the pending command.
///
/// Lists staging files left by interrupted or failed downloads.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let pending = ctx
        .downloader
        .pending_artifacts()
        .await
        .map_err(CliError::from)?;

    if pending.is_empty() {
        println!(
            "No unfinished downloads in {}",
            ctx.download_dir.path.display()
        );
        return Ok(());
    }

    println!("{:<40} {:>6} {:>12}", "NAME", "PART", "SIZE");
    for artifact in &pending {
        let part = artifact
            .part_index
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        println!(
            "{:<40} {:>6} {:>12}",
            artifact.artifact_name,
            part,
            HumanBytes(artifact.bytes).to_string()
        );
    }
    Ok(())
}
