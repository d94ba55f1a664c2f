//! Endpoint pool with failure-driven circular rotation

use crate::config::{PoolKind, ServiceConfig};
use crate::error::{ConfigError, FailureKind, Result};
use crate::rpc::defaults::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_LIVENESS_PATH};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Per-endpoint attempt statistics, recorded per attempt for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointStats {
    /// Successful attempts
    pub successes: u64,
    /// Failed attempts
    pub failures: u64,
    /// Kind of the most recent failure
    pub last_failure: Option<FailureKind>,
    /// Latency of the most recent success
    pub last_latency: Option<Duration>,
}

/// Ordered set of interchangeable base URLs serving one logical service.
///
/// The pool keeps a cursor on the "current" endpoint and a count of
/// consecutive failures. Once the count reaches the threshold, the next
/// [`select_endpoint`](Self::select_endpoint) advances the cursor circularly.
/// Counters are atomics; concurrent callers may cause an extra or a delayed
/// rotation, never an out-of-range cursor.
#[derive(Debug)]
pub struct EndpointPool {
    name: String,
    kind: PoolKind,
    endpoints: Vec<String>,
    liveness_path: String,
    failure_threshold: u32,
    current_index: AtomicUsize,
    consecutive_failures: AtomicU32,
    stats: RwLock<HashMap<String, EndpointStats>>,
}

impl EndpointPool {
    /// Create a pool; fails if no usable URL is given
    pub fn new(
        name: impl Into<String>,
        kind: PoolKind,
        urls: Vec<String>,
        failure_threshold: u32,
    ) -> Result<Self> {
        let name = name.into();
        let config = ServiceConfig::new(name.clone(), urls)
            .with_kind(kind)
            .with_failure_threshold(failure_threshold);
        Self::from_config(&config)
    }

    /// Create a pool of node mirrors with the default threshold
    pub fn mirrors(name: impl Into<String>, urls: Vec<String>) -> Result<Self> {
        Self::new(name, PoolKind::Mirrors, urls, DEFAULT_FAILURE_THRESHOLD)
    }

    /// Create a pool of load-balanced backend clusters with the default threshold
    pub fn cluster(name: impl Into<String>, urls: Vec<String>) -> Result<Self> {
        Self::new(name, PoolKind::Cluster, urls, DEFAULT_FAILURE_THRESHOLD)
    }

    /// Create a pool from service configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let endpoints = config.normalized_urls();
        if endpoints.is_empty() {
            return Err(ConfigError::EmptyPool(config.name.clone()).into());
        }

        for url in &endpoints {
            reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        }

        let liveness_path = if config.liveness_path.is_empty() {
            DEFAULT_LIVENESS_PATH.to_string()
        } else {
            config.liveness_path.clone()
        };

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            endpoints,
            liveness_path,
            failure_threshold: config.failure_threshold.max(1),
            current_index: AtomicUsize::new(0),
            consecutive_failures: AtomicU32::new(0),
            stats: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn liveness_path(&self) -> &str {
        &self.liveness_path
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// All endpoints in configured order
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Endpoint at a circular offset
    pub fn endpoint_at(&self, index: usize) -> &str {
        &self.endpoints[index % self.endpoints.len()]
    }

    /// Position of a URL in the pool
    pub fn index_of(&self, url: &str) -> Option<usize> {
        self.endpoints.iter().position(|e| e == url)
    }

    /// Cursor on the current endpoint
    pub fn current_index(&self) -> usize {
        self.current_index.load(Ordering::Acquire) % self.endpoints.len()
    }

    /// Consecutive failures recorded since the last success or rotation
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Return the current endpoint, rotating first if the failure threshold
    /// has been reached
    pub fn select_endpoint(&self) -> &str {
        let failures = self.consecutive_failures.load(Ordering::Acquire);
        if failures >= self.failure_threshold
            && self
                .consecutive_failures
                .compare_exchange(failures, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            let len = self.endpoints.len();
            let previous = self
                .current_index
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
                .unwrap_or(0);
            tracing::warn!(
                "Pool {} rotating after {} failures: {} -> {}",
                self.name,
                failures,
                self.endpoint_at(previous),
                self.endpoint_at(previous + 1)
            );
        }

        self.endpoint_at(self.current_index())
    }

    /// Count one failed endpoint toward rotation
    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(
            "Pool {} failure {}/{}",
            self.name,
            failures,
            self.failure_threshold
        );
    }

    /// Reset the consecutive failure count
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
    }

    /// Record the result of a single attempt against an endpoint
    pub fn record_attempt(&self, url: &str, result: std::result::Result<Duration, FailureKind>) {
        let mut stats = self.stats.write();
        let entry = stats.entry(url.to_string()).or_default();
        match result {
            Ok(latency) => {
                entry.successes += 1;
                entry.last_latency = Some(latency);
            }
            Err(kind) => {
                entry.failures += 1;
                entry.last_failure = Some(kind);
            }
        }
    }

    /// Attempt statistics for one endpoint
    pub fn stats(&self, url: &str) -> Option<EndpointStats> {
        self.stats.read().get(url).cloned()
    }

    /// Attempt statistics for every endpoint, in configured order
    pub fn stats_snapshot(&self) -> Vec<(String, EndpointStats)> {
        let stats = self.stats.read();
        self.endpoints
            .iter()
            .map(|url| (url.clone(), stats.get(url).cloned().unwrap_or_default()))
            .collect()
    }
}
