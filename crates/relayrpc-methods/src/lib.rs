//! relayrpc-methods — the bundled method table.
//!
//! Each module owns the translators for one resource family; this crate
//! root wires them into a [`MethodRegistryBuilder`] with their default
//! cache TTLs, and [`connect`] assembles a ready registry over HTTP peers.
//!
//! # Quick start
//! ```rust,no_run
//! use relayrpc_core::GatewayConfig;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_file("relayrpc.json")?;
//! let (registry, _pool) = relayrpc_methods::connect(&config)?;
//! let block = registry.invoke("blocks.info", json!({ "id": "123" })).await?;
//! # Ok(()) }
//! ```

pub mod blocks;
pub mod transactions;
pub mod wallets;

use std::sync::Arc;

use relayrpc_core::cache::MethodCache;
use relayrpc_core::config::GatewayConfig;
use relayrpc_core::error::TransportError;
use relayrpc_core::method::RpcMethod;
use relayrpc_core::pool::PeerPool;
use relayrpc_core::registry::{MethodRegistry, MethodRegistryBuilder};
use relayrpc_http::{HttpClientConfig, HttpPeerClient, TcpProbe};

/// Default cache TTL in seconds for every bundled method.
///
/// Chain heads move every few seconds; historical blocks and transactions
/// are effectively immutable.
pub const DEFAULT_TTLS: &[(&str, u64)] = &[
    (blocks::LATEST, 4),
    (blocks::INFO, 600),
    (blocks::TRANSACTIONS, 600),
    (transactions::INFO, 60),
    (wallets::INFO, 8),
    (wallets::TRANSACTIONS, 8),
];

/// Built-in TTL for `method`, or 0 if it is not a bundled method.
pub fn default_ttl(method: &str) -> u64 {
    DEFAULT_TTLS
        .iter()
        .find(|(name, _)| *name == method)
        .map_or(0, |(_, ttl)| *ttl)
}

fn method(config: &GatewayConfig, name: &str) -> RpcMethod {
    RpcMethod::new(name, config.ttl_for(name, default_ttl(name)))
}

/// Register every bundled method, honouring `config.cache.ttl_overrides`.
pub fn register_all(builder: MethodRegistryBuilder, config: &GatewayConfig) -> MethodRegistryBuilder {
    builder
        .register(method(config, blocks::LATEST), blocks::Latest, blocks::latest_mapper())
        .register(method(config, blocks::INFO), blocks::Info, blocks::info_mapper())
        .register(
            method(config, blocks::TRANSACTIONS),
            blocks::Transactions,
            blocks::transactions_mapper(),
        )
        .register(
            method(config, transactions::INFO),
            transactions::Info,
            transactions::info_mapper(),
        )
        .register(method(config, wallets::INFO), wallets::Info, wallets::info_mapper())
        .register(
            method(config, wallets::TRANSACTIONS),
            wallets::Transactions,
            wallets::transactions_mapper(),
        )
}

/// Build a registry over HTTP peers from `config`.
///
/// Returns the peer pool too, so the caller can feed discovery updates into
/// it while the registry serves requests.
pub fn connect(config: &GatewayConfig) -> Result<(MethodRegistry, Arc<PeerPool>), TransportError> {
    let mut pool = PeerPool::new(config.peers.clone(), config.pool_config());
    if config.probe_reachability {
        pool = pool.with_probe(Arc::new(TcpProbe {
            timeout: std::time::Duration::from_millis(config.probe_timeout_ms),
        }));
    }
    let pool = Arc::new(pool);

    let registry_config = config.registry_config();
    let transport = HttpPeerClient::new(HttpClientConfig {
        request_timeout: registry_config.request_timeout,
        ..HttpClientConfig::default()
    })?;

    tracing::info!(
        peers = pool.len(),
        probe = config.probe_reachability,
        timeout_ms = config.request_timeout_ms,
        "gateway configured"
    );

    let builder = MethodRegistry::builder(pool.clone(), Arc::new(transport))
        .config(registry_config)
        .cache(Arc::new(MethodCache::new(config.cache.capacity_per_method)));
    Ok((register_all(builder, config).build(), pool))
}
