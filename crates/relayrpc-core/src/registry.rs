//! Method registry — the single entry point for the transport layer.
//!
//! ```text
//! invoke(name, params)
//!   └─ lookup handler ──────────────── MethodNotFound
//!   └─ translate params ────────────── Validation (no cache, no network)
//!   └─ cache hit? ──────────────────── return cached value
//!   └─ spawn fetch task
//!        └─ select peer ────────────── ServiceUnavailable
//!        └─ GET with timeout ───────── failure → re-select once → ServiceUnavailable
//!        └─ map response ───────────── EntityNotFound / Upstream
//!        └─ cache result
//! ```
//!
//! The fetch runs in its own task: a caller that goes away mid-request does
//! not abort it, so the peer's answer still lands in the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cache::MethodCache;
use crate::error::{GatewayError, TransportError};
use crate::mapper::ResponseMapper;
use crate::method::{Params, PreparedCall, RequestTranslator, RpcMethod};
use crate::peer::{Peer, PeerSelector};
use crate::policy::{RetryConfig, RetryPolicy};
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::PeerTransport;

/// Request timeout and retry settings for the registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Upper bound on one outbound peer request.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            retry: RetryConfig::default(),
        }
    }
}

struct Handler {
    method: RpcMethod,
    translator: Box<dyn RequestTranslator>,
    mapper: Box<dyn ResponseMapper>,
}

struct Upstream {
    selector: Arc<dyn PeerSelector>,
    transport: Arc<dyn PeerTransport>,
    cache: Arc<MethodCache>,
    request_timeout: Duration,
    retry: RetryPolicy,
}

/// Builder for [`MethodRegistry`]. Methods can only be added here.
pub struct MethodRegistryBuilder {
    selector: Arc<dyn PeerSelector>,
    transport: Arc<dyn PeerTransport>,
    cache: Option<Arc<MethodCache>>,
    config: RegistryConfig,
    handlers: HashMap<String, Arc<Handler>>,
}

impl MethodRegistryBuilder {
    /// Use a specific cache (e.g. one shared with an invalidation hook).
    pub fn cache(mut self, cache: Arc<MethodCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind `method.name` to a translator and a mapper.
    ///
    /// Registering a name twice replaces the earlier binding.
    pub fn register(
        mut self,
        method: RpcMethod,
        translator: impl RequestTranslator,
        mapper: impl ResponseMapper,
    ) -> Self {
        let name = method.name.clone();
        let handler = Handler {
            method,
            translator: Box::new(translator),
            mapper: Box::new(mapper),
        };
        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            tracing::warn!(method = %name, "method registered twice, keeping the last binding");
        }
        self
    }

    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            handlers: self.handlers,
            upstream: Arc::new(Upstream {
                selector: self.selector,
                transport: self.transport,
                cache: self.cache.unwrap_or_default(),
                request_timeout: self.config.request_timeout,
                retry: RetryPolicy::new(self.config.retry),
            }),
        }
    }
}

/// Immutable name → handler table plus the peer/cache plumbing behind it.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<Handler>>,
    upstream: Arc<Upstream>,
}

impl MethodRegistry {
    pub fn builder(
        selector: Arc<dyn PeerSelector>,
        transport: Arc<dyn PeerTransport>,
    ) -> MethodRegistryBuilder {
        MethodRegistryBuilder {
            selector,
            transport,
            cache: None,
            config: RegistryConfig::default(),
            handlers: HashMap::new(),
        }
    }

    /// Registered methods, sorted by name.
    pub fn methods(&self) -> Vec<&RpcMethod> {
        let mut methods: Vec<&RpcMethod> = self.handlers.values().map(|h| &h.method).collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn cache(&self) -> &Arc<MethodCache> {
        &self.upstream.cache
    }

    /// Invoke a method by name.
    ///
    /// `params` must be a JSON object or null.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<Value, GatewayError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| GatewayError::MethodNotFound { method: name.to_string() })?;

        let params = match params {
            Value::Null => Params::new(),
            Value::Object(map) => map,
            _ => return Err(GatewayError::validation("Invalid params: expected an object")),
        };
        let call = handler.translator.translate(&params)?;

        if handler.method.is_cached() {
            if let Some(hit) = self.upstream.cache.get(name, &call.cache_key) {
                tracing::debug!(method = name, key = %call.cache_key, "cache hit");
                return Ok(hit);
            }
            tracing::debug!(method = name, key = %call.cache_key, "cache miss");
        }

        let upstream = Arc::clone(&self.upstream);
        let handler = Arc::clone(handler);
        let task = tokio::spawn(async move { upstream.fetch(&handler, call).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(method = name, error = %e, "request task failed");
                Err(GatewayError::unavailable("request task failed"))
            }
        }
    }

    /// Serve a JSON-RPC request, echoing its id.
    pub async fn handle(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        match self.invoke(&req.method, req.params).await {
            Ok(result) => JsonRpcResponse::success(req.id, result),
            Err(e) => JsonRpcResponse::failure(req.id, e.to_rpc_error()),
        }
    }
}

impl Upstream {
    async fn fetch(&self, handler: &Handler, call: PreparedCall) -> Result<Value, GatewayError> {
        let method = handler.method.name.as_str();
        let mut tried: Vec<Peer> = Vec::new();
        let mut last_error: Option<TransportError> = None;

        loop {
            let peer = match self.selector.select_peer(&tried).await {
                Ok(peer) => peer,
                Err(e) => {
                    tracing::warn!(method, error = %e, "no peer selectable");
                    return Err(match last_error {
                        Some(transport) => transport.into(),
                        None => e.into(),
                    });
                }
            };

            tracing::info!(
                method,
                peer = %peer,
                path = %call.request.display_path(),
                "sending request to peer"
            );

            let outcome = tokio::time::timeout(self.request_timeout, self.transport.get(&peer, &call.request))
                .await
                .unwrap_or_else(|_| {
                    Err(TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    })
                });

            let error = match outcome {
                Ok(response) => {
                    self.selector.report_success(&peer);
                    let value = handler.mapper.map(&call, response)?;
                    self.cache
                        .put(method, call.cache_key.clone(), value.clone(), handler.method.cache_ttl);
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e.into()),
                Err(e) => e,
            };

            self.selector.report_failure(&peer);
            tried.push(peer);
            let attempt = tried.len() as u32;

            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "peer request failed, selecting another peer"
                    );
                    last_error = Some(error);
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(method, attempt, error = %error, "peer request failed, giving up");
                    return Err(error.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::mapper::EntityMapper;
    use crate::method::{parse_params, EntityId};
    use crate::pool::{PeerPool, PeerPoolConfig};
    use crate::request::RpcId;
    use crate::transport::{PeerRequest, PeerResponse};

    #[derive(Default)]
    struct MockTransport {
        routes: Mutex<HashMap<String, PeerResponse>>,
        down: HashSet<String>,
        delays: HashMap<String, Duration>,
        hits: AtomicUsize,
        hosts: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn route(self, path: &str, status: u16, body: Value) -> Self {
            self.routes
                .lock()
                .insert(path.to_string(), PeerResponse::new(status, body));
            self
        }

        fn down(mut self, host: &str) -> Self {
            self.down.insert(host.to_string());
            self
        }

        fn delay(mut self, host: &str, d: Duration) -> Self {
            self.delays.insert(host.to_string(), d);
            self
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeerTransport for MockTransport {
        async fn get(&self, peer: &Peer, req: &PeerRequest) -> Result<PeerResponse, TransportError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.hosts.lock().push(peer.host.clone());
            if let Some(d) = self.delays.get(&peer.host) {
                tokio::time::sleep(*d).await;
            }
            if self.down.contains(&peer.host) {
                return Err(TransportError::Http("connection refused".into()));
            }
            Ok(self
                .routes
                .lock()
                .get(&req.display_path())
                .cloned()
                .unwrap_or_else(|| PeerResponse::new(404, json!({}))))
        }
    }

    fn block_info(params: &Params) -> Result<PreparedCall, GatewayError> {
        #[derive(Deserialize)]
        struct ById {
            id: EntityId,
        }
        let p: ById = parse_params(params)?;
        Ok(PreparedCall {
            cache_key: p.id.to_string(),
            request: PeerRequest::get(format!("blocks/{}", p.id)),
            not_found: format!("Block {} could not be found.", p.id),
        })
    }

    fn pool(hosts: &[&str]) -> Arc<PeerPool> {
        Arc::new(PeerPool::new(
            hosts.iter().map(|h| Peer::new(*h, 4002, 4003)).collect(),
            PeerPoolConfig::default(),
        ))
    }

    fn registry(hosts: &[&str], transport: Arc<MockTransport>, ttl: u64) -> MethodRegistry {
        MethodRegistry::builder(pool(hosts), transport)
            .register(RpcMethod::new("blocks.info", ttl), block_info, EntityMapper)
            .build()
    }

    fn block_123() -> MockTransport {
        MockTransport::default().route("/api/blocks/123", 200, json!({ "data": { "id": "123" } }))
    }

    #[tokio::test]
    async fn unknown_method() {
        let transport = Arc::new(block_123());
        let reg = registry(&["10.0.0.1"], transport.clone(), 60);
        let err = reg.invoke("blocks.nope", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MethodNotFound);
        assert_eq!(err.code(), -32601);
        assert_eq!(transport.hits(), 0);
    }

    #[tokio::test]
    async fn missing_param_never_reaches_cache_or_network() {
        let transport = Arc::new(block_123());
        let reg = registry(&["10.0.0.1"], transport.clone(), 60);

        let err = reg.invoke("blocks.info", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = reg.invoke("blocks.info", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = reg.invoke("blocks.info", json!(["123"])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(transport.hits(), 0);
        assert!(reg.cache().is_empty());
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let transport = Arc::new(block_123());
        let reg = registry(&["10.0.0.1"], transport.clone(), 60);

        let a = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        let b = reg
            .invoke("blocks.info", json!({ "id": "123", "ignored": true }))
            .await
            .unwrap();
        assert_eq!(a, json!({ "id": "123" }));
        assert_eq!(a, b);
        assert_eq!(transport.hits(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_fetches() {
        let transport = Arc::new(block_123());
        let reg = registry(&["10.0.0.1"], transport.clone(), 0);
        reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        assert_eq!(transport.hits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refetched() {
        let transport = Arc::new(block_123());
        let reg = registry(&["10.0.0.1"], transport.clone(), 60);
        reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        assert_eq!(transport.hits(), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_cached() {
        let transport = Arc::new(MockTransport::default());
        let reg = registry(&["10.0.0.1"], transport.clone(), 60);
        for _ in 0..2 {
            let err = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::EntityNotFound);
            assert_eq!(err.to_string(), "Block 123 could not be found.");
        }
        assert_eq!(transport.hits(), 2);
    }

    #[tokio::test]
    async fn no_peer_is_service_unavailable_without_network() {
        let transport = Arc::new(block_123());
        let reg = registry(&[], transport.clone(), 60);
        let err = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(err.code(), 503);
        assert_eq!(transport.hits(), 0);
    }

    #[tokio::test]
    async fn transport_failure_retries_once_on_another_peer() {
        let transport = Arc::new(block_123().down("10.0.0.1"));
        let reg = registry(&["10.0.0.1", "10.0.0.2"], transport.clone(), 60);

        let v = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        assert_eq!(v["id"], "123");
        let hosts = transport.hosts.lock().clone();
        assert_eq!(hosts, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
    }

    #[tokio::test]
    async fn gives_up_after_one_reselect() {
        let transport = Arc::new(
            block_123()
                .down("10.0.0.1")
                .down("10.0.0.2")
                .down("10.0.0.3"),
        );
        let reg = registry(&["10.0.0.1", "10.0.0.2", "10.0.0.3"], transport.clone(), 60);

        let err = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(transport.hits(), 2);
    }

    #[tokio::test]
    async fn single_failing_peer_is_not_retried() {
        let transport = Arc::new(block_123().down("10.0.0.1"));
        let reg = registry(&["10.0.0.1"], transport.clone(), 60);

        let err = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(transport.hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_peer_times_out_and_is_replaced() {
        let transport = Arc::new(block_123().delay("10.0.0.1", Duration::from_secs(10)));
        let reg = MethodRegistry::builder(pool(&["10.0.0.1", "10.0.0.2"]), transport.clone())
            .config(RegistryConfig {
                request_timeout: Duration::from_millis(500),
                ..Default::default()
            })
            .register(RpcMethod::new("blocks.info", 60), block_info, EntityMapper)
            .build();

        let v = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        assert_eq!(v["id"], "123");
        assert_eq!(transport.hits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_caller_still_populates_cache() {
        let transport = Arc::new(block_123().delay("10.0.0.1", Duration::from_millis(100)));
        let reg = registry(&["10.0.0.1"], transport.clone(), 60);

        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            reg.invoke("blocks.info", json!({ "id": "123" })),
        )
        .await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reg.cache().get("blocks.info", "123"), Some(json!({ "id": "123" })));

        reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap();
        assert_eq!(transport.hits(), 1);
    }

    #[tokio::test]
    async fn panicking_mapper_degrades_to_unavailable() {
        let transport = Arc::new(block_123());
        let reg = MethodRegistry::builder(pool(&["10.0.0.1"]), transport)
            .register(
                RpcMethod::new("blocks.info", 60),
                block_info,
                |_: &PreparedCall, _: PeerResponse| -> Result<Value, GatewayError> {
                    panic!("mapper bug")
                },
            )
            .build();
        let err = reg.invoke("blocks.info", json!({ "id": "123" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn concurrent_identical_calls_agree() {
        let transport = Arc::new(block_123());
        let reg = registry(&["10.0.0.1", "10.0.0.2"], transport.clone(), 60);

        let calls = (0..8).map(|_| reg.invoke("blocks.info", json!({ "id": "123" })));
        let results = futures::future::join_all(calls).await;
        for r in results {
            assert_eq!(r.unwrap(), json!({ "id": "123" }));
        }
        assert!(transport.hits() >= 1);
        assert_eq!(reg.cache().get("blocks.info", "123"), Some(json!({ "id": "123" })));
    }

    #[tokio::test]
    async fn handle_wraps_result_and_error() {
        let transport = Arc::new(block_123());
        let reg = registry(&["10.0.0.1"], transport, 60);

        let ok = reg
            .handle(JsonRpcRequest::new(1, "blocks.info", json!({ "id": "123" })))
            .await;
        assert_eq!(ok.id, RpcId::Number(1));
        assert_eq!(ok.into_result().unwrap()["id"], "123");

        let missing = reg
            .handle(JsonRpcRequest::new(2, "blocks.info", json!({ "id": "999" })))
            .await;
        let err = missing.into_result().unwrap_err();
        assert_eq!(err.code, 404);
        assert_eq!(err.message, "Block 999 could not be found.");
    }

    #[test]
    fn duplicate_registration_replaces() {
        let reg = MethodRegistry::builder(pool(&[]), Arc::new(MockTransport::default()))
            .register(RpcMethod::new("blocks.info", 60), block_info, EntityMapper)
            .register(RpcMethod::new("blocks.info", 5), block_info, EntityMapper)
            .build();
        let methods = reg.methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].cache_ttl, Duration::from_secs(5));
        assert!(reg.contains("blocks.info"));
    }
}
