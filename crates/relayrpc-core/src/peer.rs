//! Peer model and the selection contract the registry depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PeerError;

/// A remote node exposing a REST API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
    pub p2p_port: u16,
    pub api_port: u16,
}

impl Peer {
    pub fn new(host: impl Into<String>, p2p_port: u16, api_port: u16) -> Self {
        Self {
            host: host.into(),
            p2p_port,
            api_port,
        }
    }

    /// Base URL of the peer's REST API, e.g. `http://1.0.0.99:4003/api`.
    pub fn api_base_url(&self) -> String {
        format!("http://{}:{}/api", self.authority_host(), self.api_port)
    }

    /// `host:port` of the peer's p2p listener, used for reachability probes.
    pub fn p2p_addr(&self) -> String {
        format!("{}:{}", self.authority_host(), self.p2p_port)
    }

    /// IPv6 literals are bracketed so a port can follow them.
    fn authority_host(&self) -> std::borrow::Cow<'_, str> {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host).into()
        } else {
            self.host.as_str().into()
        }
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.authority_host(), self.api_port)
    }
}

/// Hands out one live peer per call.
///
/// The registry calls [`select_peer`](PeerSelector::select_peer) on every
/// cache miss and never keeps the returned peer beyond a single request, so
/// implementations are free to rotate or drop peers at any time.
#[async_trait]
pub trait PeerSelector: Send + Sync + 'static {
    /// Return a peer believed reachable that is not listed in `exclude`.
    async fn select_peer(&self, exclude: &[Peer]) -> Result<Peer, PeerError>;

    /// The last request to `peer` produced an HTTP response.
    fn report_success(&self, _peer: &Peer) {}

    /// The last request to `peer` failed at the network level.
    fn report_failure(&self, _peer: &Peer) {}
}

/// Liveness probe consulted by [`PeerPool`](crate::pool::PeerPool) before a
/// peer is handed out.
#[async_trait]
pub trait Reachability: Send + Sync + 'static {
    async fn is_reachable(&self, peer: &Peer) -> bool;
}

/// A fixed peer. Useful for CLIs and tests that talk to exactly one node.
#[derive(Debug, Clone)]
pub struct StaticPeer(pub Peer);

#[async_trait]
impl PeerSelector for StaticPeer {
    async fn select_peer(&self, exclude: &[Peer]) -> Result<Peer, PeerError> {
        if exclude.contains(&self.0) {
            return Err(PeerError::NotFound);
        }
        Ok(self.0.clone())
    }
}
