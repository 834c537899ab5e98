//! HTTP peer client backed by `reqwest`.
//!
//! Every request is a GET against `http://{host}:{api_port}/api/{path}` with
//! the query pairs url-encoded in order. Any HTTP status is returned to the
//! caller; only failures to get a response at all are errors.

use async_trait::async_trait;
use std::time::Duration;

use relayrpc_core::error::TransportError;
use relayrpc_core::peer::Peer;
use relayrpc_core::transport::{PeerRequest, PeerResponse, PeerTransport};
use serde_json::Value;

/// Configuration for `HttpPeerClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(2),
            user_agent: format!("relayrpc/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Reqwest-backed [`PeerTransport`].
///
/// Cheap to share: hold one per process behind an `Arc`.
pub struct HttpPeerClient {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpPeerClient {
    /// Build a client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let request_timeout = config.request_timeout;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            request_timeout,
        })
    }

    /// Build a client with default configuration.
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(HttpClientConfig::default())
    }

    /// The client timeout can fire while sending or while reading the body;
    /// both are reported as a timeout.
    fn transport_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    /// Full URL for `req` on `peer`, without the query string.
    pub fn url_for(peer: &Peer, req: &PeerRequest) -> String {
        format!("{}/{}", peer.api_base_url(), req.path.trim_start_matches('/'))
    }
}

#[async_trait]
impl PeerTransport for HttpPeerClient {
    async fn get(&self, peer: &Peer, req: &PeerRequest) -> Result<PeerResponse, TransportError> {
        let url = Self::url_for(peer, req);
        let resp = self
            .http
            .get(&url)
            .query(&req.query)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status().as_u16();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::debug!(%url, status, error = %e, "peer body is not JSON");
                Value::Null
            })
        };

        Ok(PeerResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_api_prefix() {
        let peer = Peer::new("1.0.0.99", 4002, 4003);
        let req = PeerRequest::get("blocks/123/transactions");
        assert_eq!(
            HttpPeerClient::url_for(&peer, &req),
            "http://1.0.0.99:4003/api/blocks/123/transactions"
        );
        let req = PeerRequest::get("/blocks");
        assert_eq!(HttpPeerClient::url_for(&peer, &req), "http://1.0.0.99:4003/api/blocks");
    }

    #[test]
    fn default_user_agent_names_crate() {
        let config = HttpClientConfig::default();
        assert!(config.user_agent.starts_with("relayrpc/"));
        assert!(HttpPeerClient::new(config).is_ok());
    }
}
