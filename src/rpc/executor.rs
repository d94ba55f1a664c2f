//! Resilient request execution across a pool of endpoints

use crate::config::PoolKind;
use crate::error::{FailureKind, FetchError, Result};
use crate::rpc::outcome::Outcome;
use crate::rpc::pool::EndpointPool;
use crate::rpc::probe::Probe;
use crate::rpc::request::RequestSpec;
use crate::rpc::transport::{HttpRequest, HttpTransport, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

/// Issues one logical request against a pool, retrying across attempts and
/// endpoints. Never fails outside of the returned [`Outcome`].
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    probe: Probe,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let probe = Probe::new(transport.clone());
        Self { transport, probe }
    }

    /// Executor over the reqwest transport
    pub fn http(proxy: Option<&str>) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(proxy)?)))
    }

    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Execute and decode the body as `T`
    pub async fn execute<T: DeserializeOwned>(
        &self,
        pool: &EndpointPool,
        spec: &RequestSpec,
    ) -> Outcome<T> {
        let start = self.starting_index(pool, spec).await;
        let endpoints = spec.endpoints_to_try(pool.len());
        let attempts = spec.attempts();
        let mut last_failure: Option<FetchError> = None;

        for offset in 0..endpoints {
            let endpoint = pool.endpoint_at(start + offset);

            for attempt in 1..=attempts {
                match self.attempt::<T>(pool, endpoint, spec).await {
                    Ok(value) => {
                        pool.record_success();
                        return Outcome::success(value, endpoint);
                    }
                    Err(err) => {
                        tracing::debug!(
                            "{} {} attempt {}/{} failed: {}",
                            pool.name(),
                            endpoint,
                            attempt,
                            attempts,
                            err
                        );
                        last_failure = Some(err);
                    }
                }

                if attempt < attempts {
                    tokio::time::sleep(spec.backoff_base * attempt).await;
                }
            }

            pool.record_failure();
            if offset + 1 < endpoints {
                tracing::warn!(
                    "{}: {} exhausted after {} attempts, trying next endpoint",
                    pool.name(),
                    endpoint,
                    attempts
                );
            }
        }

        let (kind, detail) = match last_failure {
            Some(err) => (err.kind, err.message),
            None => (FailureKind::NetworkError, "no attempt was made".to_string()),
        };
        Outcome::failure(
            kind,
            format!(
                "{} {}: all {} endpoint(s) failed, last error: {}",
                pool.name(),
                spec.target(),
                endpoints,
                detail
            ),
        )
    }

    /// Execute and return the raw JSON value
    pub async fn execute_json(&self, pool: &EndpointPool, spec: &RequestSpec) -> Outcome<Value> {
        self.execute(pool, spec).await
    }

    /// Mirrors are probed when the request asks for it; clusters and single
    /// endpoints follow the pool cursor
    async fn starting_index(&self, pool: &EndpointPool, spec: &RequestSpec) -> usize {
        if pool.kind() == PoolKind::Mirrors && spec.probe && pool.len() > 1 {
            let endpoint = self.probe.probe(pool).await;
            return pool.index_of(endpoint).unwrap_or(0);
        }
        let endpoint = pool.select_endpoint();
        pool.index_of(endpoint).unwrap_or(0)
    }

    /// One attempt against one endpoint, bounded by the request timeout. The
    /// in-flight request is dropped when the deadline fires.
    async fn attempt<T: DeserializeOwned>(
        &self,
        pool: &EndpointPool,
        endpoint: &str,
        spec: &RequestSpec,
    ) -> std::result::Result<T, FetchError> {
        let url = spec
            .url_for(endpoint)
            .map_err(|e| FetchError::new(FailureKind::NetworkError, e))?;
        let request = HttpRequest {
            method: spec.method,
            url,
            body: spec.body.clone(),
            timeout: spec.timeout,
        };

        let started = Instant::now();
        let result =
            match tokio::time::timeout(spec.timeout, self.transport.send(request)).await {
                Err(_) => Err(FetchError::new(
                    FailureKind::Timeout,
                    format!("no response within {:?}", spec.timeout),
                )),
                Ok(Err(e)) => Err(FetchError::new(e.kind(), e.to_string())),
                Ok(Ok(response)) if !response.is_success() => Err(FetchError::new(
                    FailureKind::from_status(response.status),
                    snippet(&response.body),
                )),
                Ok(Ok(response)) => serde_json::from_slice::<T>(&response.body)
                    .map_err(|e| FetchError::new(FailureKind::Malformed, e.to_string())),
            };

        pool.record_attempt(
            endpoint,
            match &result {
                Ok(_) => Ok(started.elapsed()),
                Err(err) => Err(err.kind),
            },
        );
        result
    }
}

/// Leading part of an error body, for messages
fn snippet(body: &[u8]) -> String {
    const MAX: usize = 200;
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > MAX {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    } else {
        text.to_string()
    }
}
