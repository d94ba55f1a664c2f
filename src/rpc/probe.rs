//! Liveness probing of node mirrors

use crate::rpc::defaults::PROBE_TIMEOUT;
use crate::rpc::pool::EndpointPool;
use crate::rpc::request::{Method, RequestSpec};
use crate::rpc::transport::{HttpRequest, Transport};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Reachability of one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub endpoint: String,
    pub reachable: bool,
    pub latency: Duration,
}

/// Issues cheap liveness requests to pick a reachable endpoint
#[derive(Clone)]
pub struct Probe {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Probe {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First endpoint, in configured order, that answers the liveness path.
    /// Falls back to the first configured endpoint when none answer; the
    /// caller still has to try somewhere.
    pub async fn probe<'a>(&self, pool: &'a EndpointPool) -> &'a str {
        for endpoint in pool.endpoints() {
            let result = self.check(endpoint, pool.liveness_path()).await;
            if result.reachable {
                tracing::debug!(
                    "Probe {}: {} reachable in {:?}",
                    pool.name(),
                    endpoint,
                    result.latency
                );
                return endpoint;
            }
            tracing::debug!("Probe {}: {} unreachable", pool.name(), endpoint);
        }

        tracing::warn!(
            "Probe {}: no endpoint answered, falling back to {}",
            pool.name(),
            pool.endpoint_at(0)
        );
        pool.endpoint_at(0)
    }

    /// Probe every endpoint concurrently
    pub async fn probe_all(&self, pool: &EndpointPool) -> Vec<ProbeResult> {
        let checks = pool
            .endpoints()
            .iter()
            .map(|endpoint| self.check(endpoint, pool.liveness_path()));
        join_all(checks).await
    }

    /// Probe one endpoint
    pub async fn check(&self, endpoint: &str, liveness_path: &str) -> ProbeResult {
        let start = Instant::now();
        let spec = RequestSpec::get(liveness_path);
        let reachable = match spec.url_for(endpoint) {
            Ok(url) => {
                let request = HttpRequest {
                    method: Method::Get,
                    url,
                    body: None,
                    timeout: self.timeout,
                };
                matches!(
                    tokio::time::timeout(self.timeout, self.transport.send(request)).await,
                    Ok(Ok(response)) if response.is_success()
                )
            }
            Err(e) => {
                tracing::debug!("Probe skipped {}: {}", endpoint, e);
                false
            }
        };

        ProbeResult {
            endpoint: endpoint.to_string(),
            reachable,
            latency: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::transport::stub::{Reply, StubTransport};
    use serde_json::json;

    const A: &str = "https://a.example";
    const B: &str = "https://b.example";
    const C: &str = "https://c.example";

    fn pool() -> EndpointPool {
        EndpointPool::mirrors("lcd", vec![A.into(), B.into(), C.into()]).unwrap()
    }

    #[tokio::test]
    async fn test_probe_picks_first_reachable() {
        let transport = Arc::new(
            StubTransport::new()
                .always(A, Reply::Json(503, json!({})))
                .always(B, Reply::Json(200, json!({"default_node_info": {}})))
                .always(C, Reply::Json(200, json!({}))),
        );
        let probe = Probe::new(transport.clone());
        let pool = pool();

        assert_eq!(probe.probe(&pool).await, B);
        assert_eq!(transport.calls_to(C), 0);
        assert!(transport.calls()[0]
            .as_str()
            .ends_with("/cosmos/base/tendermint/v1beta1/node_info"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_falls_back_to_first() {
        let transport = Arc::new(
            StubTransport::new()
                .always(A, Reply::Hang)
                .always(B, Reply::Refused)
                .always(C, Reply::Json(500, json!({}))),
        );
        let probe = Probe::new(transport);
        let pool = pool();

        assert_eq!(probe.probe(&pool).await, A);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_all_reports_each_endpoint() {
        let transport = Arc::new(
            StubTransport::new()
                .always(A, Reply::Json(200, json!({})))
                .always(B, Reply::Hang)
                .always(C, Reply::Refused),
        );
        let probe = Probe::new(transport).with_timeout(Duration::from_secs(1));
        let results = probe.probe_all(&pool()).await;

        let reachable: Vec<bool> = results.iter().map(|r| r.reachable).collect();
        assert_eq!(reachable, vec![true, false, false]);
        assert!(results[1].latency >= Duration::from_secs(1));
    }
}
