//! Relay integration tests over real HTTP
//!
//! Drives the reqwest transport against local mock upstreams

use explorer_relay::rpc::defaults::STAKING_PARAMS_PATH as PARAMS_PATH;
use explorer_relay::{
    CacheFileConfig, FailureKind, Outcome, PoolKind, Relay, RelayConfig, RequestTemplate,
    ServiceConfig, TtlPolicy,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIVENESS_PATH: &str = "/cosmos/base/tendermint/v1beta1/node_info";

fn config(kind: PoolKind, urls: Vec<String>) -> RelayConfig {
    RelayConfig::builder()
        .service(ServiceConfig::new("lcd", urls).with_kind(kind))
        .backoff_base_ms(0)
        .inter_batch_delay_ms(0)
        .cache(CacheFileConfig {
            persist: false,
            path: None,
        })
        .build()
        .unwrap()
}

fn relay(kind: PoolKind, servers: &[&MockServer]) -> Relay {
    Relay::new(config(kind, servers.iter().map(|s| s.uri()).collect())).unwrap()
}

fn params_body() -> Value {
    json!({"params": {"max_validators": 150, "bond_denom": "ujuno"}})
}

// ==================== Single fetch ====================

#[tokio::test]
async fn test_failover_from_failing_cluster() {
    let bad = MockServer::start().await;
    let good = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PARAMS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&bad)
        .await;
    Mock::given(method("GET"))
        .and(path(PARAMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(params_body()))
        .expect(1)
        .mount(&good)
        .await;

    let relay = relay(PoolKind::Cluster, &[&bad, &good]);
    let outcome: Outcome<Value> = relay
        .fetch_outcome("lcd", &relay.request(PARAMS_PATH))
        .await
        .unwrap();

    assert_eq!(outcome.endpoint_used(), Some(good.uri().as_str()));
    assert_eq!(outcome.value().unwrap()["params"]["max_validators"], 150);

    let pool = relay.pool("lcd").unwrap();
    assert_eq!(pool.stats(&bad.uri()).unwrap().failures, 2);
    assert_eq!(
        pool.stats(&bad.uri()).unwrap().last_failure,
        Some(FailureKind::HttpError(500))
    );
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let slow = MockServer::start().await;
    let fast = MockServer::start().await;

    Mock::given(path(PARAMS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(params_body())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;
    Mock::given(path(PARAMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(params_body()))
        .mount(&fast)
        .await;

    let relay = relay(PoolKind::Cluster, &[&slow, &fast]);
    let spec = relay
        .request(PARAMS_PATH)
        .with_timeout(Duration::from_millis(200))
        .with_attempts(1);
    let outcome: Outcome<Value> = relay.fetch_outcome("lcd", &spec).await.unwrap();

    assert_eq!(outcome.endpoint_used(), Some(fast.uri().as_str()));
    assert_eq!(
        relay.pool("lcd").unwrap().stats(&slow.uri()).unwrap().last_failure,
        Some(FailureKind::Timeout)
    );
}

#[tokio::test]
async fn test_mirrors_probe_skips_dead_node() {
    let dead = MockServer::start().await;
    let live = MockServer::start().await;

    Mock::given(path(LIVENESS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&dead)
        .await;
    Mock::given(path(PARAMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(params_body()))
        .expect(0)
        .mount(&dead)
        .await;
    Mock::given(path(LIVENESS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_node_info": {}})))
        .mount(&live)
        .await;
    Mock::given(path(PARAMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(params_body()))
        .expect(1)
        .mount(&live)
        .await;

    let relay = relay(PoolKind::Mirrors, &[&dead, &live]);
    let value: Value = relay.fetch("lcd", &relay.request(PARAMS_PATH)).await.unwrap();
    assert_eq!(value["params"]["bond_denom"], "ujuno");

    let probes = relay.probe_service("lcd").await.unwrap();
    let reachable: Vec<bool> = probes.iter().map(|p| p.reachable).collect();
    assert_eq!(reachable, vec![false, true]);
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(path(PARAMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let relay = relay(PoolKind::Cluster, &[&server]);
    let outcome: Outcome<Value> = relay
        .fetch_outcome("lcd", &relay.request(PARAMS_PATH))
        .await
        .unwrap();
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Malformed));
}

// ==================== Batch ====================

#[tokio::test]
async fn test_batch_keeps_failed_keys_in_place() {
    let server = MockServer::start().await;
    for (address, amount) in [("juno1a", "10"), ("juno1c", "30")] {
        Mock::given(path(format!("/cosmos/bank/v1beta1/balances/{}", address)))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"balances": [{"denom": "ujuno", "amount": amount}]}),
            ))
            .mount(&server)
            .await;
    }
    Mock::given(path("/cosmos/bank/v1beta1/balances/juno1b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let relay = relay(PoolKind::Cluster, &[&server]);
    let template = RequestTemplate::new(
        relay
            .request("/cosmos/bank/v1beta1/balances/{key}")
            .with_attempts(1),
    )
    .unwrap();

    let keys: Vec<String> = vec!["juno1a".into(), "juno1b".into(), "juno1c".into()];
    let result = relay
        .fetch_batch::<Value>("lcd", &template, keys.clone())
        .await
        .unwrap();

    assert_eq!(result.keys().cloned().collect::<Vec<_>>(), keys);
    assert_eq!(result.failed(), 1);

    let rows = result.resolve(json!({"balances": []}));
    assert!(!rows[0].degraded);
    assert!(rows[1].degraded);
    assert_eq!(rows[1].value, json!({"balances": []}));
    assert_eq!(rows[2].value["balances"][0]["amount"], "30");
}

// ==================== Contract queries and broadcast ====================

#[tokio::test]
async fn test_smart_query_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/cosmwasm/wasm/v1/contract/juno1cw20/smart/[A-Za-z0-9+%=]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"decimals": 6}})))
        .expect(1)
        .mount(&server)
        .await;

    let relay = relay(PoolKind::Cluster, &[&server]);
    let value: Value = relay
        .smart_query("lcd", "juno1cw20", &json!({"token_info": {}}))
        .await
        .unwrap();
    assert_eq!(value["data"]["decimals"], 6);
}

#[tokio::test]
async fn test_broadcast_posts_tx_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cosmos/tx/v1beta1/txs"))
        .and(body_partial_json(
            json!({"tx_bytes": "c2lnbmVk", "mode": "BROADCAST_MODE_SYNC"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tx_response": {"code": 0}})))
        .expect(1)
        .mount(&server)
        .await;

    let relay = relay(PoolKind::Cluster, &[&server]);
    let value = relay
        .broadcast_tx("lcd", b"signed", "BROADCAST_MODE_SYNC")
        .await
        .unwrap();
    assert_eq!(value["tx_response"]["code"], 0);
}

// ==================== Caching ====================

#[tokio::test]
async fn test_persisted_cache_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(path(PARAMS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(params_body()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config(PoolKind::Cluster, vec![server.uri()]);
    config.cache = CacheFileConfig {
        persist: true,
        path: Some(dir.path().join("cache.json")),
    };

    let first = Relay::new(config.clone()).unwrap();
    let spec = first.request(PARAMS_PATH);
    let a: Value = first
        .fetch_cached_client("lcd", &spec, TtlPolicy::network_params())
        .await
        .unwrap();
    drop(first);

    let second = Relay::new(config).unwrap();
    let b: Value = second
        .fetch_cached_client("lcd", &spec, TtlPolicy::network_params())
        .await
        .unwrap();

    assert_eq!(a, b);
    assert!(dir.path().join("cache.json").exists());
}
