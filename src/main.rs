//! explorer-relay CLI - resilient fetches against explorer upstreams

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    match &cli.command {
        Commands::Get(args) => cli::fetch::get(args, &cli).await,
        Commands::Batch(args) => cli::fetch::batch(args, &cli).await,
        Commands::Query(args) => cli::fetch::query(args, &cli).await,
        Commands::Broadcast(args) => cli::fetch::broadcast(args, &cli).await,
        Commands::Endpoints { action } => cli::endpoints::handle(action, &cli).await,
        Commands::Config { action } => cli::config::handle(action, &cli),
        Commands::Cache { action } => cli::cache::handle(action, &cli),
    }
}
