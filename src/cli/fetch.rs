//! Fetch commands: get, batch, query, broadcast

use super::Cli;
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Args;
use explorer_relay::{
    create_writer, BatchConfig, ChunkProgress, OutputFormat, Relay, RequestTemplate, TtlPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Args)]
pub struct GetArgs {
    /// Service name
    pub service: String,

    /// Request path, e.g. /cosmos/staking/v1beta1/params
    pub path: String,

    /// Query parameter as name=value (can be repeated)
    #[arg(short = 'p', long = "param", action = clap::ArgAction::Append)]
    pub params: Vec<String>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Attempts per endpoint
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Timeout and retry shape: liveness, balance, query, proxy, broadcast
    /// (defaults to the configured settings)
    #[arg(long)]
    pub profile: Option<String>,

    /// Serve from the persisted cache, fresh for this many seconds
    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Service name
    pub service: String,

    /// Path template containing {key}
    pub template: String,

    /// Keys to substitute for {key}
    pub keys: Vec<String>,

    /// Read keys from file (one per line, # comments allowed)
    #[arg(long)]
    pub keys_file: Option<PathBuf>,

    /// Requests in flight per chunk
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Pause between chunks in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Attempts per endpoint
    #[arg(long)]
    pub attempts: Option<u32>,

    /// JSON value substituted for failed keys
    #[arg(long, default_value = "null")]
    pub default: String,

    /// Output format (json, csv)
    #[arg(long, default_value = "json")]
    pub format: String,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Service name
    pub service: String,

    /// Contract address
    pub contract: String,

    /// Query message as JSON
    pub msg: String,
}

#[derive(Args)]
pub struct BroadcastArgs {
    /// Service name
    pub service: String,

    /// Signed transaction bytes, base64
    pub tx: String,

    /// Broadcast mode
    #[arg(long, default_value = "BROADCAST_MODE_SYNC")]
    pub mode: String,
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Split `name=value`
fn parse_param(raw: &str) -> anyhow::Result<(&str, &str)> {
    raw.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .with_context(|| format!("Invalid parameter '{}', expected name=value", raw))
}

/// Keys from the command line followed by keys from a file
fn collect_keys(args: &BatchArgs) -> anyhow::Result<Vec<String>> {
    let mut keys = args.keys.clone();
    if let Some(path) = &args.keys_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading keys from {}", path.display()))?;
        for line in content.lines() {
            let key = line.trim();
            if !key.is_empty() && !key.starts_with('#') {
                keys.push(key.to_string());
            }
        }
    }
    Ok(keys)
}

pub async fn get(args: &GetArgs, cli: &Cli) -> anyhow::Result<()> {
    let relay = Relay::new(cli.relay_config(Some(&args.service))?)?;

    let mut spec = match &args.profile {
        Some(name) => relay.request_profile(name.parse()?, args.path.as_str()),
        None => relay.request(args.path.as_str()),
    };
    for raw in &args.params {
        let (name, value) = parse_param(raw)?;
        spec = spec.with_query(name, value);
    }
    if let Some(secs) = args.timeout {
        spec = spec.with_timeout(Duration::from_secs(secs));
    }
    if let Some(attempts) = args.attempts {
        spec = spec.with_attempts(attempts);
    }

    let value: Value = match args.ttl {
        Some(secs) => {
            relay
                .fetch_cached_client(&args.service, &spec, TtlPolicy::doubled(secs))
                .await?
        }
        None => {
            let outcome = relay.fetch_outcome::<Value>(&args.service, &spec).await?;
            if let Some(endpoint) = outcome.endpoint_used() {
                tracing::info!("Served by {}", endpoint);
            }
            outcome.into_result()?
        }
    };

    print_json(&value)?;
    relay.flush().await;
    Ok(())
}

pub async fn batch(args: &BatchArgs, cli: &Cli) -> anyhow::Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let default: Value = serde_json::from_str(&args.default)
        .with_context(|| format!("--default is not JSON: {}", args.default))?;

    let relay = Relay::new(cli.relay_config(Some(&args.service))?)?;

    let mut spec = relay.request(args.template.as_str());
    if let Some(attempts) = args.attempts {
        spec = spec.with_attempts(attempts);
    }
    let template = RequestTemplate::new(spec)?;

    let keys = collect_keys(args)?;
    let mut batch_config: BatchConfig = relay.config().batch_config();
    if let Some(size) = args.batch_size {
        batch_config.batch_size = size;
    }
    if let Some(ms) = args.delay_ms {
        batch_config.inter_batch_delay = Duration::from_millis(ms);
    }

    let pb = if !cli.quiet {
        let pb = ProgressBar::new(keys.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let pb_clone = pb.clone();
    let start = Instant::now();
    let result = relay
        .fetch_batch_with_progress::<Value, _>(
            &args.service,
            &template,
            keys,
            batch_config,
            move |progress: ChunkProgress| {
                if let Some(ref pb) = pb_clone {
                    pb.set_position(progress.items_done as u64);
                    pb.set_message(format!(
                        "chunk {}/{}, {} failed",
                        progress.chunks_done, progress.chunks_total, progress.failures
                    ));
                }
            },
        )
        .await?;
    let elapsed = start.elapsed();

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let (total, failed) = (result.len(), result.failed());
    let rows = result.resolve(default);

    let mut writer = create_writer(format, args.output.as_deref())?;
    writer.write_items(&rows)?;
    writer.finalize()?;

    if !cli.quiet {
        eprintln!(
            "Fetched {} keys in {:.2}s ({} degraded)",
            total,
            elapsed.as_secs_f64(),
            failed
        );
    }

    Ok(())
}

pub async fn query(args: &QueryArgs, cli: &Cli) -> anyhow::Result<()> {
    let msg: Value = serde_json::from_str(&args.msg)
        .with_context(|| format!("query message is not JSON: {}", args.msg))?;

    let relay = Relay::new(cli.relay_config(Some(&args.service))?)?;
    let value: Value = relay.smart_query(&args.service, &args.contract, &msg).await?;
    print_json(&value)
}

pub async fn broadcast(args: &BroadcastArgs, cli: &Cli) -> anyhow::Result<()> {
    let tx_bytes = STANDARD
        .decode(args.tx.trim())
        .context("transaction is not valid base64")?;

    let relay = Relay::new(cli.relay_config(Some(&args.service))?)?;
    let value = relay.broadcast_tx(&args.service, &tx_bytes, &args.mode).await?;
    print_json(&value)
}
