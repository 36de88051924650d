//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that validate CLI input, call the `Downloader`, and
//!   format output for the terminal
//!
//! Failures are returned as `CliError` inside `anyhow::Error` so `main`
//! can pick the exit code.

pub mod get;
pub mod path;
pub mod pending;
pub mod rm;
pub mod status;
