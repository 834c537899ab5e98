//! relayrpc-core — foundation types for the RelayRPC gateway.
//!
//! # Overview
//!
//! RelayRPC serves named JSON-RPC methods by translating each call into a
//! GET against the REST API of a live peer. The core crate defines:
//!
//! - [`MethodRegistry`] — the single entry point the transport layer calls
//! - [`RequestTranslator`] / [`ResponseMapper`] — per-method request shaping
//!   and response classification
//! - [`MethodCache`] — per-method TTL + LRU result cache
//! - [`PeerSelector`] / [`PeerPool`] — peer lookup with circuit breakers
//! - [`PeerTransport`] — the async trait every HTTP client implements
//! - [`GatewayError`] — the error taxonomy surfaced to RPC callers
//! - [`config`] module — JSON-loadable gateway configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod mapper;
pub mod method;
pub mod peer;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod request;
pub mod transport;

pub use cache::MethodCache;
pub use config::{ConfigError, GatewayConfig, LogConfig};
pub use error::{ErrorKind, GatewayError, PeerError, TransportError};
pub use mapper::{EmptyList, EntityMapper, FirstOfList, PagedList, ResponseMapper};
pub use method::{parse_params, EntityId, Params, PreparedCall, RequestTranslator, RpcMethod};
pub use peer::{Peer, PeerSelector, Reachability, StaticPeer};
pub use pool::{PeerPool, PeerPoolConfig};
pub use registry::{MethodRegistry, MethodRegistryBuilder, RegistryConfig};
pub use request::{JsonRpcRequest, JsonRpcResponse, RpcError, RpcId};
pub use transport::{HealthStatus, PeerRequest, PeerResponse, PeerTransport};
