//! Command-line front end for the modelpull downloader.
//!
//! - `parser` / `commands` - clap definitions
//! - `bootstrap` - builds the `Downloader` from flags and environment
//! - `handlers` - one module per subcommand
//! - `presentation` - terminal progress rendering
//! - `error` - `CliError` and exit codes

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;

// Used only by the binary entry point
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod utils;

// Re-export primary types for convenient access
pub use bootstrap::{CliContext, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
