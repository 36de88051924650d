//! CLI entry point - the composition root.
//!
//! Wires tracing and the downloader via bootstrap, then dispatches to a
//! handler. Errors carrying a `CliError` pick the process exit code.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use modelpull_cli::{Cli, CliError, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose { "modelpull=debug" } else { "modelpull=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = bootstrap(&cli)?;

    match &cli.command {
        Commands::Get(args) => handlers::get::execute(&ctx, args).await,
        Commands::Status { name } => handlers::status::execute(&ctx, name).await,
        Commands::Path { name } => handlers::path::execute(&ctx, name).await,
        Commands::Rm { name } => handlers::rm::execute(&ctx, name).await,
        Commands::Pending => handlers::pending::execute(&ctx).await,
    }
}

#[tokio::main]
async fn main() {
    // Load .env before clap reads env-backed flags
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}
