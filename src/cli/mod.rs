//! CLI command modules
//!
//! Each subcommand has its own module with argument definitions and handlers.

pub mod cache;
pub mod config;
pub mod endpoints;
pub mod fetch;

use anyhow::Context;
use clap::{Parser, Subcommand};
use explorer_relay::{ConfigFile, PoolKind, RelayConfig, ServiceConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "explorer-relay")]
#[command(
    version,
    about = "Resilient multi-endpoint fetches, batches and caching for explorer backends"
)]
#[command(after_help = r#"EXAMPLES:
    # Staking params from the first healthy LCD mirror
    explorer-relay get lcd /cosmos/staking/v1beta1/params

    # Supply of one denom, cached for 5 minutes
    explorer-relay get lcd /cosmos/bank/v1beta1/supply/by_denom -p denom=ujuno --ttl 300

    # Balances for many addresses, 10 at a time, as CSV
    explorer-relay batch lcd '/cosmos/bank/v1beta1/balances/{key}' \
                   --keys-file addresses.txt --format csv -o balances.csv

    # Smart-contract query
    explorer-relay query lcd juno1contract... '{"token_info":{}}'

    # Ad hoc pool without a config file
    explorer-relay --endpoint https://lcd-a.example --endpoint https://lcd-b.example \
                   get lcd /cosmos/base/tendermint/v1beta1/node_info

CONFIG FILE:
    Default: ~/.config/explorer-relay/config.toml (create with `config init`)
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(long, env = "EXPLORER_RELAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Use only these endpoints for the named service (can be repeated)
    #[arg(long = "endpoint", action = clap::ArgAction::Append, global = true)]
    pub endpoints: Vec<String>,

    /// Pool kind for --endpoint (mirrors or cluster)
    #[arg(long, default_value = "mirrors", global = true)]
    pub kind: PoolKind,

    /// Use proxy for all requests (http/https/socks5)
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resilient single fetch
    Get(fetch::GetArgs),

    /// Fetch one request template for many keys
    Batch(Box<fetch::BatchArgs>),

    /// CosmWasm smart-contract query
    Query(fetch::QueryArgs),

    /// Forward a signed transaction
    Broadcast(fetch::BroadcastArgs),

    /// Inspect and probe service endpoints
    Endpoints {
        #[command(subcommand)]
        action: endpoints::EndpointCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigCommands,
    },

    /// Manage the persisted response cache
    Cache {
        #[command(subcommand)]
        action: cache::CacheCommands,
    },
}

impl Cli {
    /// Config file in effect
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ConfigFile::default_path)
    }

    /// Load the config file. A missing default file is an empty config; a
    /// missing explicit file is an error.
    pub fn load_config_file(&self) -> anyhow::Result<ConfigFile> {
        let path = self.config_path();
        if !path.exists() {
            if self.config.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(ConfigFile::default());
        }
        ConfigFile::load(&path).with_context(|| format!("loading {}", path.display()))
    }

    /// Runtime config from the file plus command-line overrides. `--endpoint`
    /// replaces the pool of `service`.
    pub fn relay_config(&self, service: Option<&str>) -> anyhow::Result<RelayConfig> {
        let mut config = RelayConfig::from_file(self.load_config_file()?);

        if !self.endpoints.is_empty() {
            let name = service.context("--endpoint needs a command that names a service")?;
            config.services.retain(|s| s.name != name);
            config
                .services
                .push(ServiceConfig::new(name, self.endpoints.clone()).with_kind(self.kind));
        }

        if let Some(name) = service {
            if config.service(name).is_none() {
                anyhow::bail!(
                    "Unknown service '{}'. Configure it in {} or pass --endpoint",
                    name,
                    self.config_path().display()
                );
            }
        }

        if self.proxy.is_some() {
            config.proxy = self.proxy.clone();
        }
        Ok(config)
    }
}
