//! Peer pool with round-robin selection and per-peer circuit breakers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::PeerError;
use crate::peer::{Peer, PeerSelector, Reachability};
use crate::policy::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::transport::HealthStatus;

/// Configuration for the peer pool.
#[derive(Debug, Clone)]
pub struct PeerPoolConfig {
    /// Circuit breaker config applied to every peer.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Upper bound on a single reachability probe.
    pub probe_timeout: Duration,
}

impl Default for PeerPoolConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

struct PeerSlot {
    peer: Peer,
    circuit: CircuitBreaker,
}

/// Round-robin peer pool.
///
/// Peers are keyed by host. The discovery side mutates the pool through
/// [`upsert`](PeerPool::upsert) and [`remove`](PeerPool::remove) while
/// requests are in flight; selection always works on a snapshot.
///
/// Peers whose circuit is open are skipped. When a [`Reachability`] probe is
/// attached, each candidate's p2p port is probed before it is handed out and
/// an unreachable candidate counts as a failure.
pub struct PeerPool {
    slots: RwLock<Vec<Arc<PeerSlot>>>,
    cursor: AtomicUsize,
    config: PeerPoolConfig,
    probe: Option<Arc<dyn Reachability>>,
}

impl PeerPool {
    /// Build a pool from an initial list of peers.
    pub fn new(peers: Vec<Peer>, config: PeerPoolConfig) -> Self {
        let pool = Self {
            slots: RwLock::new(Vec::with_capacity(peers.len())),
            cursor: AtomicUsize::new(0),
            config,
            probe: None,
        };
        for peer in peers {
            pool.upsert(peer);
        }
        pool
    }

    /// Attach a reachability probe.
    pub fn with_probe(mut self, probe: Arc<dyn Reachability>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Insert a peer, or replace the peer with the same host.
    ///
    /// A replaced peer keeps its circuit state when its ports are unchanged.
    pub fn upsert(&self, peer: Peer) {
        let mut slots = self.slots.write();
        match slots.iter().position(|s| s.peer.host == peer.host) {
            Some(idx) if slots[idx].peer == peer => {}
            Some(idx) => slots[idx] = Arc::new(self.slot(peer)),
            None => {
                tracing::debug!(peer = %peer, "peer added to pool");
                slots.push(Arc::new(self.slot(peer)));
            }
        }
    }

    /// Remove the peer with the given host. Returns `true` if it was present.
    pub fn remove(&self, host: &str) -> bool {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|s| s.peer.host != host);
        before != slots.len()
    }

    /// Number of peers in the pool.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns `true` if the pool has no peers.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// All known peers, in insertion order.
    pub fn peers(&self) -> Vec<Peer> {
        self.slots.read().iter().map(|s| s.peer.clone()).collect()
    }

    /// Returns each peer with its circuit state.
    pub fn health_summary(&self) -> Vec<(Peer, CircuitState)> {
        self.slots
            .read()
            .iter()
            .map(|s| (s.peer.clone(), s.circuit.state()))
            .collect()
    }

    /// Aggregate health across all peers.
    pub fn health(&self) -> HealthStatus {
        let slots = self.slots.read();
        let allowed = slots.iter().filter(|s| s.circuit.is_allowed()).count();
        match allowed {
            0 => HealthStatus::Unhealthy,
            n if n == slots.len() => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        }
    }

    /// Probe every peer once and feed the outcome into its circuit.
    ///
    /// Returns each peer with its reachability, or `None` for every peer
    /// when no probe is attached.
    pub async fn check_all(&self) -> Vec<(Peer, Option<bool>)> {
        let slots: Vec<Arc<PeerSlot>> = self.slots.read().clone();
        let mut report = Vec::with_capacity(slots.len());
        for slot in slots {
            let reachable = match &self.probe {
                Some(probe) => {
                    let ok = self.probe_slot(probe.as_ref(), &slot).await;
                    if ok {
                        slot.circuit.record_success();
                    } else {
                        slot.circuit.record_failure();
                    }
                    Some(ok)
                }
                None => None,
            };
            report.push((slot.peer.clone(), reachable));
        }
        report
    }

    async fn probe_slot(&self, probe: &dyn Reachability, slot: &PeerSlot) -> bool {
        tokio::time::timeout(self.config.probe_timeout, probe.is_reachable(&slot.peer))
            .await
            .unwrap_or(false)
    }

    fn slot(&self, peer: Peer) -> PeerSlot {
        let circuit = CircuitBreaker::new(peer.to_string(), self.config.circuit_breaker.clone());
        PeerSlot { peer, circuit }
    }

    fn find(&self, peer: &Peer) -> Option<Arc<PeerSlot>> {
        self.slots.read().iter().find(|s| &s.peer == peer).cloned()
    }

    /// Selectable slots in round-robin order starting at the cursor.
    fn candidates(&self, exclude: &[Peer]) -> Vec<Arc<PeerSlot>> {
        let slots = self.slots.read();
        if slots.is_empty() {
            return Vec::new();
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % slots.len();
        (0..slots.len())
            .map(|i| &slots[(start + i) % slots.len()])
            .filter(|s| !exclude.contains(&s.peer) && s.circuit.is_allowed())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PeerSelector for PeerPool {
    async fn select_peer(&self, exclude: &[Peer]) -> Result<Peer, PeerError> {
        for slot in self.candidates(exclude) {
            // A half-open peer admits one trial; concurrent callers move on.
            if !slot.circuit.try_acquire() {
                continue;
            }
            let Some(probe) = &self.probe else {
                return Ok(slot.peer.clone());
            };
            if self.probe_slot(probe.as_ref(), &slot).await {
                return Ok(slot.peer.clone());
            }
            tracing::warn!(peer = %slot.peer, "peer is unresponsive, choosing another");
            slot.circuit.record_failure();
        }
        Err(PeerError::NotFound)
    }

    fn report_success(&self, peer: &Peer) {
        if let Some(slot) = self.find(peer) {
            slot.circuit.record_success();
        }
    }

    fn report_failure(&self, peer: &Peer) {
        if let Some(slot) = self.find(peer) {
            slot.circuit.record_failure();
        }
    }
}
