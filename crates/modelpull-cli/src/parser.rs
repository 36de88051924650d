//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Resumable downloads of model artifacts.
#[derive(Debug, Parser)]
#[command(name = "modelpull")]
#[command(about = "Resumable, split, verified downloads of model artifacts")]
#[command(version)]
pub struct Cli {
    /// Download directory (overrides MODELPULL_DIR)
    #[arg(long = "dir", global = true)]
    pub dir: Option<String>,

    /// Attempts per request before giving up
    #[arg(long = "max-attempts", global = true)]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry in milliseconds; doubles on each retry
    #[arg(long = "retry-base-ms", global = true)]
    pub retry_base_ms: Option<u64>,

    /// Bearer token for private repositories
    #[arg(long, env = "MODELPULL_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "modelpull",
            "--verbose",
            "--dir",
            "/tmp/models",
            "--max-attempts",
            "3",
            "pending",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.dir.as_deref(), Some("/tmp/models"));
        assert_eq!(cli.max_attempts, Some(3));
        assert!(matches!(cli.command, Commands::Pending));
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::parse_from(["modelpull", "status", "model.bin", "--retry-base-ms", "250"]);
        assert_eq!(cli.retry_base_ms, Some(250));
    }
}
