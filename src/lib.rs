//! explorer-relay - resilient multi-endpoint request layer
//!
//! A Rust library and CLI for explorer backends that sit in front of
//! unreliable blockchain node mirrors and load-balanced aggregation clusters:
//! endpoint rotation and probing, retries with timeouts and backoff,
//! bounded-concurrency batch fan-out, and read-through caching with
//! stale-while-revalidate.
//!
//! # Example
//!
//! ```rust,no_run
//! use explorer_relay::rpc::defaults::STAKING_PARAMS_PATH;
//! use explorer_relay::{Relay, RelayConfig, RequestTemplate, ServiceConfig, TtlPolicy};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::builder()
//!         .service(ServiceConfig::new(
//!             "lcd",
//!             vec![
//!                 "https://lcd-1.example.org".into(),
//!                 "https://lcd-2.example.org".into(),
//!             ],
//!         ))
//!         .build()?;
//!     let relay = Relay::new(config)?;
//!
//!     let params: Value = relay
//!         .fetch_cached(
//!             "lcd",
//!             &relay.request(STAKING_PARAMS_PATH),
//!             TtlPolicy::network_params(),
//!         )
//!         .await?;
//!     println!("{}", params);
//!
//!     let template = RequestTemplate::get("/cosmos/bank/v1beta1/balances/{key}")?;
//!     let balances = relay
//!         .fetch_batch::<Value>("lcd", &template, vec!["juno1...".into()])
//!         .await?;
//!     println!("{} ok, {} failed", balances.succeeded(), balances.failed());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod output;
pub mod rpc;

// Re-exports for convenience
pub use batch::{
    BatchConfig, BatchItem, BatchOrchestrator, BatchResult, ChunkProgress, ResolvedItem,
};
pub use cache::{CacheEntry, CacheStore, FileStore, Freshness, MemoryStore, ReadThroughCache, TtlPolicy};
pub use config::{
    CacheFileConfig, ConfigFile, PoolKind, RelayConfig, RelayConfigBuilder, ServiceConfig,
    Settings,
};
pub use error::{
    BatchError, CacheError, ConfigError, Error, FailureKind, FetchError, OutputError, Result,
};
pub use fetcher::Relay;
pub use output::{create_writer, CsvWriter, JsonWriter, OutputFormat, OutputWriter};
pub use rpc::{
    EndpointPool, EndpointStats, Executor, HttpTransport, Method, Outcome, Probe, ProbeResult,
    RequestProfile, RequestSpec, RequestTemplate, Transport,
};
