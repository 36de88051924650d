//! Subcommand definitions.

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download an artifact, resuming any earlier partial download
    Get(GetArgs),

    /// Show whether an artifact is downloaded or partially downloaded
    Status {
        /// Artifact name
        name: String,
    },

    /// Print the path of a downloaded artifact
    Path {
        /// Artifact name
        name: String,
    },

    /// Delete an artifact and its staging files
    Rm {
        /// Artifact name
        name: String,
    },

    /// List unfinished downloads in the download directory
    Pending,
}

/// Arguments of `modelpull get`.
#[derive(Debug, Clone, Args)]
pub struct GetArgs {
    /// Source URL
    pub url: String,

    /// Artifact name (defaults to the last URL path segment)
    #[arg(long)]
    pub name: Option<String>,

    /// Expected size in bytes
    #[arg(long)]
    pub size: Option<u64>,

    /// Download in ranges of this many bytes (requires --size)
    #[arg(long = "part-size", requires = "size")]
    pub part_size: Option<u64>,

    /// Expected SHA-256 (hex, optionally prefixed with "sha256:")
    #[arg(long)]
    pub sha256: Option<String>,

    /// Discard any partial download and start over
    #[arg(long = "no-resume")]
    pub no_resume: bool,
}
