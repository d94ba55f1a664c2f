//! Relay facade: named upstream services behind one resilient interface

use crate::batch::{BatchConfig, BatchItem, BatchOrchestrator, BatchResult, ChunkProgress};
use crate::cache::{FileStore, ReadThroughCache, TtlPolicy};
use crate::config::RelayConfig;
use crate::error::{ConfigError, Result};
use crate::rpc::{
    EndpointPool, Executor, HttpTransport, Outcome, ProbeResult, RequestProfile, RequestSpec,
    RequestTemplate, Transport,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Entry point for route handlers and the CLI.
///
/// Holds one [`EndpointPool`] per configured service for the life of the
/// process, a shared [`Executor`], a process-local cache for server-side
/// calls and, when persistence is enabled, a file-backed cache for
/// client-side calls.
pub struct Relay {
    config: RelayConfig,
    pools: Vec<Arc<EndpointPool>>,
    by_name: HashMap<String, usize>,
    executor: Executor,
    server_cache: ReadThroughCache,
    client_cache: Option<ReadThroughCache>,
}

impl Relay {
    /// Create a relay over HTTP, honoring the configured proxy
    pub fn new(config: RelayConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.proxy.as_deref())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a relay over a custom transport
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let mut pools = Vec::with_capacity(config.services.len());
        let mut by_name = HashMap::new();
        for service in &config.services {
            let pool = EndpointPool::from_config(service)?;
            by_name.insert(service.name.clone(), pools.len());
            pools.push(Arc::new(pool));
        }

        let client_cache = if config.cache.persist {
            let store = FileStore::open_or_empty(config.cache.resolved_path());
            Some(ReadThroughCache::new(Arc::new(store)))
        } else {
            None
        };

        tracing::debug!(
            "Relay ready with {} services ({})",
            pools.len(),
            pools
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            config,
            pools,
            by_name,
            executor: Executor::new(transport),
            server_cache: ReadThroughCache::memory(),
            client_cache,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Pools in configuration order
    pub fn pools(&self) -> &[Arc<EndpointPool>] {
        &self.pools
    }

    /// Pool for a named service
    pub fn pool(&self, service: &str) -> Result<Arc<EndpointPool>> {
        self.by_name
            .get(service)
            .map(|&i| self.pools[i].clone())
            .ok_or_else(|| ConfigError::UnknownService(service.to_string()).into())
    }

    /// A GET request carrying the configured timeout, retries and backoff
    pub fn request(&self, path: impl Into<String>) -> RequestSpec {
        RequestSpec::get(path)
            .with_timeout(self.config.request_timeout())
            .with_attempts(self.config.settings.retry_attempts)
            .with_backoff_base(self.config.backoff_base())
    }

    /// A GET request shaped by `profile`, keeping the configured backoff.
    /// Balance lookups fail fast; forwarded RPC traffic gets the long budget.
    pub fn request_profile(&self, profile: RequestProfile, path: impl Into<String>) -> RequestSpec {
        RequestSpec::with_profile(profile, path).with_backoff_base(self.config.backoff_base())
    }

    /// Single resilient fetch. Only an unknown service is an error here;
    /// upstream failures live in the outcome.
    pub async fn fetch_outcome<T: DeserializeOwned>(
        &self,
        service: &str,
        spec: &RequestSpec,
    ) -> Result<Outcome<T>> {
        let pool = self.pool(service)?;
        Ok(self.executor.execute(&pool, spec).await)
    }

    /// Single resilient fetch, failing with the classified error
    pub async fn fetch<T: DeserializeOwned>(&self, service: &str, spec: &RequestSpec) -> Result<T> {
        let outcome = self.fetch_outcome(service, spec).await?;
        Ok(outcome.into_result()?)
    }

    /// Orchestrator configured from settings
    pub fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(self.config.batch_config())
    }

    /// Fetch `template` for every key; total over the input keys
    pub async fn fetch_batch<T: DeserializeOwned>(
        &self,
        service: &str,
        template: &RequestTemplate,
        keys: Vec<String>,
    ) -> Result<BatchResult<String, T>> {
        self.fetch_batch_with(self.orchestrator(), service, template, keys)
            .await
    }

    /// Batch fetch with a progress callback and optional chunking overrides
    pub async fn fetch_batch_with_progress<T, F>(
        &self,
        service: &str,
        template: &RequestTemplate,
        keys: Vec<String>,
        config: BatchConfig,
        progress: F,
    ) -> Result<BatchResult<String, T>>
    where
        T: DeserializeOwned,
        F: Fn(ChunkProgress) + Send + Sync + 'static,
    {
        let orchestrator = BatchOrchestrator::new(config).with_progress(progress);
        self.fetch_batch_with(orchestrator, service, template, keys)
            .await
    }

    async fn fetch_batch_with<T: DeserializeOwned>(
        &self,
        orchestrator: BatchOrchestrator,
        service: &str,
        template: &RequestTemplate,
        keys: Vec<String>,
    ) -> Result<BatchResult<String, T>> {
        let pool = self.pool(service)?;
        let items = BatchItem::from_template(keys, template);
        Ok(orchestrator
            .run_batch(&self.executor, &pool, items)
            .await?)
    }

    /// Server-side cached fetch in the process-local store
    pub async fn fetch_cached<T>(&self, service: &str, spec: &RequestSpec, policy: TtlPolicy) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.cached(&self.server_cache, service, spec, policy).await
    }

    /// Client-side cached fetch in the persisted store, or the process-local
    /// store when persistence is off
    pub async fn fetch_cached_client<T>(
        &self,
        service: &str,
        spec: &RequestSpec,
        policy: TtlPolicy,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let cache = self.client_cache.as_ref().unwrap_or(&self.server_cache);
        self.cached(cache, service, spec, policy).await
    }

    async fn cached<T>(
        &self,
        cache: &ReadThroughCache,
        service: &str,
        spec: &RequestSpec,
        policy: TtlPolicy,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let pool = self.pool(service)?;
        let key = cache_key(service, spec);
        let executor = self.executor.clone();
        let spec = spec.clone();

        let value = cache
            .get_or_fetch(&key, policy, move || async move {
                executor.execute::<T>(&pool, &spec).await.into_result()
            })
            .await?;
        Ok(value)
    }

    /// CosmWasm smart-contract query
    pub async fn smart_query<T: DeserializeOwned>(
        &self,
        service: &str,
        contract: &str,
        msg: &Value,
    ) -> Result<T> {
        let spec = RequestSpec::smart_query(contract, msg).with_backoff_base(self.config.backoff_base());
        self.fetch(service, &spec).await
    }

    /// Forward signed transaction bytes; one attempt per endpoint
    pub async fn broadcast_tx(&self, service: &str, tx_bytes: &[u8], mode: &str) -> Result<Value> {
        let spec = RequestSpec::broadcast_tx(tx_bytes, mode);
        self.fetch(service, &spec).await
    }

    /// Probe every endpoint of a service
    pub async fn probe_service(&self, service: &str) -> Result<Vec<ProbeResult>> {
        let pool = self.pool(service)?;
        Ok(self.executor.probe().probe_all(&pool).await)
    }

    /// The persisted client cache, if enabled
    pub fn client_cache(&self) -> Option<&ReadThroughCache> {
        self.client_cache.as_ref()
    }

    /// Wait for background cache refreshes to land in their stores
    pub async fn flush(&self) {
        self.server_cache.settle().await;
        if let Some(cache) = &self.client_cache {
            cache.settle().await;
        }
    }

    /// Empty both caches
    pub fn clear_caches(&self) -> Result<()> {
        self.server_cache.store().clear()?;
        if let Some(cache) = &self.client_cache {
            cache.store().clear()?;
        }
        Ok(())
    }
}

/// Cache key for a request against a service; POST bodies are part of it
fn cache_key(service: &str, spec: &RequestSpec) -> String {
    let mut key = format!("{}:{:?}:{}", service, spec.method, spec.target());
    if let Some(body) = &spec.body {
        key.push(':');
        key.push_str(&body.to_string());
    }
    key
}
