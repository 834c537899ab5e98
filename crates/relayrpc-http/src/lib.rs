//! relayrpc-http — `reqwest` transport and TCP reachability probe.
//!
//! ```rust,no_run
//! use relayrpc_core::{PeerPool, PeerPoolConfig};
//! use relayrpc_http::{HttpPeerClient, TcpProbe};
//! use std::sync::Arc;
//!
//! let transport = Arc::new(HttpPeerClient::with_defaults().unwrap());
//! let pool = PeerPool::new(vec![], PeerPoolConfig::default())
//!     .with_probe(Arc::new(TcpProbe::default()));
//! ```

pub mod client;
pub mod probe;

pub use client::{HttpClientConfig, HttpPeerClient};
pub use probe::TcpProbe;
