//! Quiver CLI - Command-line interface for search migrations.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quiver_cli::cli::{Cli, Command};
use quiver_cli::commands;
use quiver_cli::error::CliResult;
use quiver_cli::output;

/// Environment variable holding the log filter
const LOG_ENV: &str = "QUIVER_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Run the CLI and handle errors
    if let Err(e) = run(cli).await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = cli.config;

    match cli.command {
        Command::Generate(args) => commands::generate::run(args, &config).await,
        Command::Diff(args) => commands::diff::run(args, &config).await,
        Command::Migrate(args) => commands::migrate::run(args, &config).await,
        Command::Push(args) => commands::push::run(args, &config).await,
        Command::Pull(args) => commands::pull::run(args, &config).await,
        Command::Version => commands::version::run().await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
