//! Request descriptions consumed by the executor

use crate::error::BatchError;
use crate::rpc::defaults::{
    RequestProfile, BROADCAST_PATH, DEFAULT_ATTEMPTS_PER_ENDPOINT, DEFAULT_BACKOFF_BASE,
    KEY_PLACEHOLDER, SMART_QUERY_PATH,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One logical upstream call, independent of which endpoint serves it
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// HTTP method
    pub method: Method,
    /// Path relative to the endpoint base URL; may contain `{key}`
    pub path: String,
    /// Query parameters; values may contain `{key}`
    pub query: Vec<(String, String)>,
    /// JSON body for POST requests
    pub body: Option<Value>,
    /// Hard deadline for one attempt
    pub timeout: Duration,
    /// Attempts on one endpoint before moving on
    pub max_attempts_per_endpoint: u32,
    /// Endpoints to try; `None` means the whole pool
    pub max_endpoints_to_try: Option<usize>,
    /// Linear backoff base between attempts on one endpoint
    pub backoff_base: Duration,
    /// Probe mirror pools before the real request
    pub probe: bool,
    /// Value substituted for `{key}`
    key: Option<String>,
}

impl RequestSpec {
    /// A GET request with the query profile
    pub fn get(path: impl Into<String>) -> Self {
        Self::with_profile(RequestProfile::Query, path)
    }

    /// A POST request with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        let mut spec = Self::with_profile(RequestProfile::Query, path);
        spec.method = Method::Post;
        spec.body = Some(body);
        spec
    }

    /// A GET request shaped by a profile
    pub fn with_profile(profile: RequestProfile, path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: profile.timeout(),
            max_attempts_per_endpoint: profile.attempts_per_endpoint(),
            max_endpoints_to_try: None,
            backoff_base: DEFAULT_BACKOFF_BASE,
            probe: profile.probes(),
            key: None,
        }
    }

    /// CosmWasm smart-contract query; the message travels base64-encoded in the path
    pub fn smart_query(contract: &str, msg: &Value) -> Self {
        let encoded = STANDARD.encode(msg.to_string());
        Self::get(format!(
            "{}/{}/smart/{}",
            SMART_QUERY_PATH, contract, KEY_PLACEHOLDER
        ))
        .with_key(encoded)
    }

    /// Forward already-signed transaction bytes
    pub fn broadcast_tx(tx_bytes: &[u8], mode: &str) -> Self {
        let body = serde_json::json!({
            "tx_bytes": STANDARD.encode(tx_bytes),
            "mode": mode,
        });
        let mut spec = Self::with_profile(RequestProfile::Broadcast, BROADCAST_PATH);
        spec.method = Method::Post;
        spec.body = Some(body);
        spec
    }

    /// Add a query parameter
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts_per_endpoint = attempts;
        self
    }

    pub fn with_max_endpoints(mut self, endpoints: usize) -> Self {
        self.max_endpoints_to_try = Some(endpoints);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_probe(mut self, probe: bool) -> Self {
        self.probe = probe;
        self
    }

    /// Bind the value substituted for `{key}`
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The bound key, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Attempts per endpoint, never less than one
    pub fn attempts(&self) -> u32 {
        self.max_attempts_per_endpoint.max(1)
    }

    /// Endpoints to try for a pool of `pool_len`, clamped to `[1, pool_len]`
    pub fn endpoints_to_try(&self, pool_len: usize) -> usize {
        self.max_endpoints_to_try
            .unwrap_or(pool_len)
            .clamp(1, pool_len.max(1))
    }

    /// Whether the path or query references `{key}`
    pub fn has_placeholder(&self) -> bool {
        self.path.contains(KEY_PLACEHOLDER)
            || self.query.iter().any(|(_, v)| v.contains(KEY_PLACEHOLDER))
    }

    /// Resolve against an endpoint base URL. Path segments and query values
    /// are percent-encoded, so keys containing `/` stay in one segment.
    pub fn url_for(&self, base: &str) -> std::result::Result<Url, String> {
        let mut url = Url::parse(base).map_err(|e| format!("{}: {}", base, e))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| format!("{} cannot be used as a base URL", base))?;
            segments.pop_if_empty();
            for segment in self.path.split('/').filter(|s| !s.is_empty()) {
                segments.push(&self.render(segment));
            }
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, &self.render(value));
            }
        }
        Ok(url)
    }

    /// Path and query as sent upstream, independent of the endpoint
    pub fn target(&self) -> String {
        match self.url_for("http://relay.invalid") {
            Ok(url) => match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            },
            Err(_) => self.path.clone(),
        }
    }

    fn render(&self, raw: &str) -> String {
        match &self.key {
            Some(key) => raw.replace(KEY_PLACEHOLDER, key),
            None => raw.to_string(),
        }
    }
}

/// A [`RequestSpec`] instantiated once per batch key
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    spec: RequestSpec,
}

impl RequestTemplate {
    /// Wrap a request whose path or query contains `{key}`
    pub fn new(spec: RequestSpec) -> std::result::Result<Self, BatchError> {
        if !spec.has_placeholder() {
            return Err(BatchError::InvalidTemplate(format!(
                "{} does not contain {}",
                spec.path, KEY_PLACEHOLDER
            )));
        }
        Ok(Self { spec })
    }

    /// GET template over a path such as `/cosmos/bank/v1beta1/balances/{key}`
    pub fn get(path: impl Into<String>) -> std::result::Result<Self, BatchError> {
        Self::new(RequestSpec::get(path))
    }

    /// The request for one key
    pub fn instantiate(&self, key: &str) -> RequestSpec {
        self.spec.clone().with_key(key)
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::defaults::{BALANCES_PATH, SUPPLY_PATH};

    #[test]
    fn test_url_join() {
        let spec = RequestSpec::get("/cosmos/staking/v1beta1/params");
        let url = spec.url_for("https://lcd.example.com/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://lcd.example.com/cosmos/staking/v1beta1/params"
        );

        let url = spec.url_for("https://proxy.example.com/osmosis").unwrap();
        assert_eq!(
            url.as_str(),
            "https://proxy.example.com/osmosis/cosmos/staking/v1beta1/params"
        );
    }

    #[test]
    fn test_template_instantiation() {
        let template = RequestTemplate::get(BALANCES_PATH).unwrap();
        let spec = template.instantiate("cosmos1abc");
        assert_eq!(spec.target(), "/cosmos/bank/v1beta1/balances/cosmos1abc");
        assert_eq!(spec.key(), Some("cosmos1abc"));
    }

    #[test]
    fn test_key_with_slash_stays_one_segment() {
        let template = RequestTemplate::get("/denoms/{key}/holders").unwrap();
        let spec = template.instantiate("ibc/27394FB092");
        assert_eq!(spec.target(), "/denoms/ibc%2F27394FB092/holders");
    }

    #[test]
    fn test_query_placeholder() {
        let template =
            RequestTemplate::new(RequestSpec::get(SUPPLY_PATH).with_query("denom", "{key}"))
                .unwrap();
        let spec = template.instantiate("ibc/ABC");
        assert_eq!(
            spec.target(),
            "/cosmos/bank/v1beta1/supply/by_denom?denom=ibc%2FABC"
        );
    }

    #[test]
    fn test_template_requires_placeholder() {
        let result = RequestTemplate::get("/cosmos/staking/v1beta1/params");
        assert!(matches!(result, Err(BatchError::InvalidTemplate(_))));
    }

    #[test]
    fn test_smart_query_encoding() {
        let msg = serde_json::json!({"token_info": {}});
        let spec = RequestSpec::smart_query("juno1contract", &msg);
        let expected = STANDARD.encode(r#"{"token_info":{}}"#);
        assert_eq!(
            spec.target(),
            format!("/cosmwasm/wasm/v1/contract/juno1contract/smart/{}", expected)
        );
    }

    #[test]
    fn test_broadcast_body() {
        let spec = RequestSpec::broadcast_tx(&[1, 2, 3], "BROADCAST_MODE_SYNC");
        assert_eq!(spec.method, Method::Post);
        assert_eq!(spec.attempts(), 1);
        let body = spec.body.unwrap();
        assert_eq!(body["tx_bytes"], "AQID");
        assert_eq!(body["mode"], "BROADCAST_MODE_SYNC");
    }

    #[test]
    fn test_endpoint_clamping() {
        let spec = RequestSpec::get("/x");
        assert_eq!(spec.endpoints_to_try(3), 3);
        assert_eq!(spec.clone().with_max_endpoints(0).endpoints_to_try(3), 1);
        assert_eq!(spec.clone().with_max_endpoints(9).endpoints_to_try(3), 3);
        assert_eq!(spec.with_attempts(0).attempts(), 1);
    }
}
