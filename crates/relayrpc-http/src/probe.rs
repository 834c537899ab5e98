//! TCP reachability probe for peer p2p ports.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use relayrpc_core::peer::{Peer, Reachability};

/// A peer is reachable if a TCP connection to its p2p port opens within
/// `timeout`. The connection is dropped immediately.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }
}

#[async_trait]
impl Reachability for TcpProbe {
    async fn is_reachable(&self, peer: &Peer) -> bool {
        let addr = peer.p2p_addr();
        match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(%addr, error = %e, "p2p port refused connection");
                false
            }
            Err(_) => {
                tracing::debug!(%addr, "p2p port probe timed out");
                false
            }
        }
    }
}
