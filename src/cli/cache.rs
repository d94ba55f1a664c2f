//! Persisted cache commands

use super::Cli;
use clap::Subcommand;
use explorer_relay::{CacheStore, FileStore};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache file path
    Path,

    /// Delete every cached response
    Clear,

    /// Drop entries past their stale window
    Prune,
}

pub fn handle(action: &CacheCommands, cli: &Cli) -> anyhow::Result<()> {
    let path = cli.load_config_file()?.cache.resolved_path();

    match action {
        CacheCommands::Path => {
            println!("{}", path.display());
        }

        CacheCommands::Clear => {
            let store = FileStore::open_or_empty(&path);
            let entries = store.len();
            store.clear()?;
            println!("Removed {} cached responses", entries);
        }

        CacheCommands::Prune => {
            let store = FileStore::open(&path)?;
            let removed = store.prune()?;
            println!("Pruned {} expired entries, {} left", removed, store.len());
        }
    }

    Ok(())
}
