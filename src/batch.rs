//! Bounded-concurrency fan-out over many keys
//!
//! Keys are split into consecutive chunks. Every request of a chunk runs
//! concurrently and the chunk settles completely (a failing item never
//! cancels its siblings) before a short pause and the next chunk. The result
//! is total over the input: every key appears exactly once, in input order,
//! with its own [`Outcome`].

use crate::error::BatchError;
use crate::rpc::{EndpointPool, Executor, Outcome, RequestSpec, RequestTemplate};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

/// Chunking and pacing of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Items in flight per chunk
    pub batch_size: usize,
    /// Pause between chunks, skipped after the last one
    pub inter_batch_delay: Duration,
    /// Largest key list accepted by one call
    pub max_keys: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay: Duration::from_millis(50),
            max_keys: 100,
        }
    }
}

impl BatchConfig {
    /// Number of chunks for `items` keys
    pub fn chunk_count(&self, items: usize) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        items.div_ceil(self.batch_size)
    }
}

/// A key paired with the request that serves it
#[derive(Debug, Clone)]
pub struct BatchItem<K> {
    pub key: K,
    pub spec: RequestSpec,
}

impl<K: Display> BatchItem<K> {
    pub fn new(key: K, spec: RequestSpec) -> Self {
        Self { key, spec }
    }

    /// One item per key, instantiating the template with the key's display form
    pub fn from_template(keys: impl IntoIterator<Item = K>, template: &RequestTemplate) -> Vec<Self> {
        keys.into_iter()
            .map(|key| {
                let spec = template.instantiate(&key.to_string());
                Self { key, spec }
            })
            .collect()
    }
}

/// Progress after each settled chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunks_done: usize,
    pub chunks_total: usize,
    pub items_done: usize,
    pub items_total: usize,
    pub failures: usize,
}

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(ChunkProgress) + Send + Sync>;

/// A batch item with failures replaced by a caller-supplied default.
/// `degraded` tells "zero" apart from "unknown".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedItem<K, T> {
    pub key: K,
    pub value: T,
    pub degraded: bool,
    pub endpoint: Option<String>,
    pub error: Option<String>,
}

/// Outcome for every input key, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult<K, T> {
    items: Vec<(K, Outcome<T>)>,
    chunks: usize,
}

impl<K, T> BatchResult<K, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of chunks that were run
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &(K, Outcome<T>)> {
        self.items.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.iter().map(|(k, _)| k)
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn into_items(self) -> Vec<(K, Outcome<T>)> {
        self.items
    }

    /// Outcome for one key
    pub fn get(&self, key: &K) -> Option<&Outcome<T>>
    where
        K: PartialEq,
    {
        self.items.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }

    /// Keyed view
    pub fn into_map(self) -> HashMap<K, Outcome<T>>
    where
        K: Eq + Hash,
    {
        self.items.into_iter().collect()
    }

    /// Flatten, substituting `default` for failed items and marking them degraded
    pub fn resolve(self, default: T) -> Vec<ResolvedItem<K, T>>
    where
        T: Clone,
    {
        self.items
            .into_iter()
            .map(|(key, outcome)| match outcome {
                Outcome::Success {
                    value,
                    endpoint_used,
                } => ResolvedItem {
                    key,
                    value,
                    degraded: false,
                    endpoint: Some(endpoint_used),
                    error: None,
                },
                Outcome::Failure { kind, message } => ResolvedItem {
                    key,
                    value: default.clone(),
                    degraded: true,
                    endpoint: None,
                    error: Some(format!("{}: {}", kind, message)),
                },
            })
            .collect()
    }

    /// Flatten to `(key, value)` pairs, `default` for failed items
    pub fn values_or(self, default: T) -> Vec<(K, T)>
    where
        T: Clone,
    {
        self.items
            .into_iter()
            .map(|(key, outcome)| (key, outcome.value_or(default.clone())))
            .collect()
    }
}

/// Runs batches under bounded concurrency
#[derive(Default)]
pub struct BatchOrchestrator {
    config: BatchConfig,
    progress: Option<ProgressCallback>,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Set progress callback
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ChunkProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Reject malformed batches before any I/O
    pub fn validate<'a, K>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<(), BatchError>
    where
        K: Eq + Hash + Display + 'a,
    {
        if self.config.batch_size == 0 {
            return Err(BatchError::InvalidBatchSize);
        }

        let mut seen = HashSet::new();
        for key in keys {
            if !seen.insert(key) {
                return Err(BatchError::DuplicateKey(key.to_string()));
            }
        }

        if seen.is_empty() {
            return Err(BatchError::EmptyKeys);
        }
        if seen.len() > self.config.max_keys {
            return Err(BatchError::TooManyKeys {
                max: self.config.max_keys,
                requested: seen.len(),
            });
        }
        Ok(())
    }

    /// Fan an arbitrary per-key task out over `keys`
    pub async fn run<K, T, F, Fut>(&self, keys: Vec<K>, task: F) -> Result<BatchResult<K, T>, BatchError>
    where
        K: Clone + Eq + Hash + Display,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        self.validate(&keys)?;
        Ok(self.settle_chunks(keys, K::clone, task).await)
    }

    /// Execute one request per item against `pool`
    pub async fn run_batch<K, T>(
        &self,
        executor: &Executor,
        pool: &EndpointPool,
        items: Vec<BatchItem<K>>,
    ) -> Result<BatchResult<K, T>, BatchError>
    where
        K: Clone + Eq + Hash + Display,
        T: DeserializeOwned,
    {
        self.validate(items.iter().map(|item| &item.key))?;

        let result = self
            .settle_chunks(
                items,
                |item: &BatchItem<K>| item.key.clone(),
                move |item: BatchItem<K>| async move {
                    executor.execute::<T>(pool, &item.spec).await
                },
            )
            .await;

        tracing::info!(
            "{}: batch of {} keys in {} chunks, {} ok, {} failed",
            pool.name(),
            result.len(),
            result.chunks(),
            result.succeeded(),
            result.failed()
        );
        Ok(result)
    }

    async fn settle_chunks<I, K, T, KeyFn, F, Fut>(
        &self,
        items: Vec<I>,
        key_of: KeyFn,
        task: F,
    ) -> BatchResult<K, T>
    where
        KeyFn: Fn(&I) -> K,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let items_total = items.len();
        let chunks_total = self.config.chunk_count(items_total);
        let mut remaining = items.into_iter().peekable();
        let mut settled: Vec<(K, Outcome<T>)> = Vec::with_capacity(items_total);
        let mut chunks_done = 0;
        let mut failures = 0;

        while remaining.peek().is_some() {
            if chunks_done > 0 && !self.config.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.config.inter_batch_delay).await;
            }

            let chunk: Vec<I> = remaining.by_ref().take(self.config.batch_size).collect();
            let keys: Vec<K> = chunk.iter().map(&key_of).collect();
            let outcomes = join_all(chunk.into_iter().map(&task)).await;

            for (key, outcome) in keys.into_iter().zip(outcomes) {
                if !outcome.is_success() {
                    failures += 1;
                }
                settled.push((key, outcome));
            }
            chunks_done += 1;

            tracing::debug!(
                "Chunk {}/{} settled ({} items, {} failures so far)",
                chunks_done,
                chunks_total,
                settled.len(),
                failures
            );
            if let Some(cb) = &self.progress {
                cb(ChunkProgress {
                    chunks_done,
                    chunks_total,
                    items_done: settled.len(),
                    items_total,
                    failures,
                });
            }
        }

        BatchResult {
            items: settled,
            chunks: chunks_done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::rpc::transport::stub::{Reply, StubTransport};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn orchestrator(batch_size: usize, delay_ms: u64) -> BatchOrchestrator {
        BatchOrchestrator::new(BatchConfig {
            batch_size,
            inter_batch_delay: Duration::from_millis(delay_ms),
            max_keys: 100,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_and_delays() {
        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = progress.clone();
        let orchestrator = orchestrator(10, 50).with_progress(move |p| sink.lock().push(p));

        let keys: Vec<u32> = (0..25).collect();
        let started = Instant::now();
        let result = orchestrator
            .run(keys.clone(), |k| async move { Outcome::success(k * 2, "stub") })
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.chunks(), 3);
        let done: Vec<usize> = progress.lock().iter().map(|p| p.items_done).collect();
        assert_eq!(done, vec![10, 20, 25]);
        // two pauses: after chunk 1 and after chunk 2, none after chunk 3
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150));
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), keys);
    }

    #[tokio::test]
    async fn test_output_is_total_over_mixed_failures() {
        let orchestrator = orchestrator(8, 0);
        let keys: Vec<u32> = (0..37).collect();

        let result = orchestrator
            .run(keys.clone(), |k| async move {
                if k % 3 == 0 {
                    Outcome::failure(FailureKind::HttpError(500), "boom")
                } else {
                    Outcome::success(k, "stub")
                }
            })
            .await
            .unwrap();

        assert_eq!(result.chunks(), 5);
        assert_eq!(result.len(), 37);
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), keys);
        assert_eq!(result.failed(), 13);
        assert_eq!(
            result.get(&9).and_then(|o| o.failure_kind()),
            Some(FailureKind::HttpError(500))
        );
        assert_eq!(result.get(&10).and_then(|o| o.value()), Some(&10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_survives_reverse_completion() {
        let orchestrator = orchestrator(5, 0);
        let keys: Vec<u64> = (0..5).collect();

        let result = orchestrator
            .run(keys.clone(), |k| async move {
                tokio::time::sleep(Duration::from_millis(50 - k * 10)).await;
                Outcome::success(k, "stub")
            })
            .await
            .unwrap();

        let values: Vec<u64> = result.values_or(u64::MAX).into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, keys);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_cancel_siblings() {
        let orchestrator = orchestrator(3, 0);
        let result = orchestrator
            .run(vec!["fast-fail", "slow", "ok"], |k| async move {
                match k {
                    "fast-fail" => Outcome::failure(FailureKind::NetworkError, "refused"),
                    "slow" => {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        Outcome::success(1, "stub")
                    }
                    _ => Outcome::success(2, "stub"),
                }
            })
            .await
            .unwrap();

        assert_eq!(result.succeeded(), 2);
        assert_eq!(result.get(&"slow").and_then(|o| o.value()), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_chunk() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let orchestrator = orchestrator(4, 10);
        let keys: Vec<u64> = (0..10).collect();

        let result = orchestrator
            .run(keys, |k| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5 + k)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Outcome::success(k, "stub")
                }
            })
            .await
            .unwrap();

        assert_eq!(result.chunks(), 3);
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_structural_errors_before_any_work() {
        let calls = Arc::new(AtomicUsize::new(0));
        let task = |k: u32| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Outcome::success(k, "stub")
            }
        };

        let empty = orchestrator(10, 0).run(Vec::new(), &task).await;
        assert_eq!(empty.unwrap_err(), BatchError::EmptyKeys);

        let oversized = orchestrator(10, 0).run((0..101).collect(), &task).await;
        assert_eq!(
            oversized.unwrap_err(),
            BatchError::TooManyKeys {
                max: 100,
                requested: 101
            }
        );

        let duplicate = orchestrator(10, 0).run(vec![1, 2, 1], &task).await;
        assert_eq!(duplicate.unwrap_err(), BatchError::DuplicateKey("1".into()));

        let zero = orchestrator(0, 0).run(vec![1], &task).await;
        assert_eq!(zero.unwrap_err(), BatchError::InvalidBatchSize);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_batch_over_executor() {
        const X: &str = "https://x.example";
        let transport = Arc::new(
            StubTransport::new()
                .then(X, Reply::Json(200, json!({"balances": [{"denom": "uatom", "amount": "5"}]})))
                .then(X, Reply::Json(500, json!({"message": "internal"})))
                .then(X, Reply::Json(200, json!({"balances": []}))),
        );
        let executor = Executor::new(transport.clone());
        let pool = EndpointPool::cluster("lcd", vec![X.to_string()]).unwrap();
        let template = RequestTemplate::new(
            RequestSpec::get("/cosmos/bank/v1beta1/balances/{key}").with_attempts(1),
        )
        .unwrap();

        let items = BatchItem::from_template(
            vec!["cosmos1a".to_string(), "cosmos1b".to_string(), "cosmos1c".to_string()],
            &template,
        );
        let result: BatchResult<String, Value> = orchestrator(10, 50)
            .run_batch(&executor, &pool, items)
            .await
            .unwrap();

        assert_eq!(result.chunks(), 1);
        assert_eq!(result.succeeded(), 2);
        assert!(transport.calls()[1]
            .path()
            .ends_with("/balances/cosmos1b"));

        let resolved = result.resolve(json!({"balances": []}));
        assert!(!resolved[0].degraded);
        assert_eq!(resolved[0].endpoint.as_deref(), Some(X));
        assert!(resolved[1].degraded);
        assert!(resolved[1].error.as_deref().unwrap().starts_with("HTTP 500"));
        assert_eq!(resolved[1].value, json!({"balances": []}));
    }

    #[test]
    fn test_chunk_count() {
        let config = BatchConfig::default();
        assert_eq!(config.chunk_count(25), 3);
        assert_eq!(config.chunk_count(10), 1);
        assert_eq!(config.chunk_count(0), 0);
    }
}
