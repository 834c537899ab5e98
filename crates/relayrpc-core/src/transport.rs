//! The `PeerTransport` trait — how the registry reaches a peer's REST API.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::peer::Peer;

/// Aggregate health of the peer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Every peer is selectable.
    Healthy,
    /// Some peers (or probes) are failing.
    Degraded,
    /// Not responding (circuit open), or no peers at all.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// An outbound GET against a peer's REST API.
///
/// `path` is relative to the `/api` prefix, without a leading slash
/// (`"blocks/123/transactions"`). Query pairs keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl PeerRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query parameter only when `value` is present.
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Path plus query string, e.g. `/api/blocks?orderBy=height:desc&limit=1`.
    ///
    /// Used for logging; transports encode the query themselves.
    pub fn display_path(&self) -> String {
        let mut out = format!("/api/{}", self.path);
        for (i, (k, v)) in self.query.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }
}

/// What a peer answered: the HTTP status and the decoded JSON body.
///
/// A body that is empty or not JSON is represented as `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerResponse {
    pub status: u16,
    pub body: Value,
}

impl PeerResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues HTTP requests against peers.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn PeerTransport>`.
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Send one GET request to `peer`.
    ///
    /// Only failures to obtain a response are errors; any HTTP status,
    /// including 4xx and 5xx, is returned as `Ok`.
    async fn get(&self, peer: &Peer, req: &PeerRequest) -> Result<PeerResponse, TransportError>;
}
