//! Status command handler.

use anyhow::Result;
use indicatif::HumanBytes;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the status command.
///
/// Reports whether `name` is downloaded, partially downloaded, or absent.
pub async fn execute(ctx: &CliContext, name: &str) -> Result<()> {
    if let Some(path) = ctx.downloader.artifact_path(name).await {
        let size = tokio::fs::metadata(&path).await.map_err(CliError::from)?.len();
        println!("downloaded  {} ({})", path.display(), HumanBytes(size));
        return Ok(());
    }

    let staged: Vec<_> = ctx
        .downloader
        .pending_artifacts()
        .await
        .map_err(CliError::from)?
        .into_iter()
        .filter(|p| p.artifact_name == name)
        .collect();

    if staged.is_empty() {
        println!("not downloaded  {name}");
        return Ok(());
    }

    let bytes: u64 = staged.iter().map(|p| p.bytes).sum();
    println!(
        "partial  {name}: {} in {} staging file(s)",
        HumanBytes(bytes),
        staged.len()
    );
    Ok(())
}
