//! Error taxonomy for the gateway.
//!
//! Three layers of errors exist:
//!
//! - [`TransportError`] — the HTTP call to a peer never produced a response
//! - [`PeerError`] — the peer selector could not hand out a peer
//! - [`GatewayError`] — what an RPC caller finally sees, one variant per
//!   [`ErrorKind`] with a stable numeric code

use serde_json::json;
use thiserror::Error;

use crate::request::RpcError;

/// Errors that can occur while talking to a peer over HTTP.
///
/// A peer answering with a non-2xx status is *not* a transport error; the
/// status travels back in a [`PeerResponse`](crate::transport::PeerResponse)
/// and is classified by the method's response mapper.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure, etc.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The transport could not be constructed or used.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if a fresh peer might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

/// Errors returned by a [`PeerSelector`](crate::peer::PeerSelector).
#[derive(Debug, Clone, Error)]
pub enum PeerError {
    /// No known peer is currently selectable.
    #[error("no peer available")]
    NotFound,

    /// The selector itself failed (storage unavailable, lock poisoned, ...).
    #[error("peer selector fault: {0}")]
    Fault(String),
}

/// The kind of a [`GatewayError`], for callers that branch on kind rather
/// than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    MethodNotFound,
    EntityNotFound,
    Upstream,
    ServiceUnavailable,
}

impl ErrorKind {
    /// Stable error code reported to RPC callers.
    pub fn code(self) -> i64 {
        match self {
            Self::Validation => -32602,
            Self::MethodNotFound => -32601,
            Self::EntityNotFound => 404,
            Self::Upstream => 502,
            Self::ServiceUnavailable => 503,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::MethodNotFound => write!(f, "method-not-found"),
            Self::EntityNotFound => write!(f, "entity-not-found"),
            Self::Upstream => write!(f, "upstream"),
            Self::ServiceUnavailable => write!(f, "service-unavailable"),
        }
    }
}

/// Terminal outcome of a failed RPC invocation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Bad or missing RPC parameters. Never reaches the network.
    #[error("{message}")]
    Validation { message: String },

    /// The method name is not registered.
    #[error("Method {method} not found.")]
    MethodNotFound { method: String },

    /// The peer returned 404, or an empty list where one entity was expected.
    #[error("{message}")]
    EntityNotFound { message: String },

    /// The peer returned an unexpected status or a malformed body.
    #[error("Peer responded with HTTP {status}: {reason}")]
    Upstream { status: u16, reason: String },

    /// No peer could be reached.
    #[error("Service unavailable: {reason}")]
    ServiceUnavailable { reason: String },
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::EntityNotFound { message: message.into() }
    }

    pub fn upstream(status: u16, reason: impl Into<String>) -> Self {
        Self::Upstream { status, reason: reason.into() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable { reason: reason.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            Self::EntityNotFound { .. } => ErrorKind::EntityNotFound,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
        }
    }

    pub fn code(&self) -> i64 {
        self.kind().code()
    }

    /// Convert into the `{code, message, data}` object sent to RPC callers.
    pub fn to_rpc_error(&self) -> RpcError {
        let data = match self {
            Self::Upstream { status, .. } => Some(json!({ "status": status })),
            _ => None,
        };
        RpcError {
            code: self.code(),
            message: self.to_string(),
            data,
        }
    }
}

impl From<PeerError> for GatewayError {
    fn from(e: PeerError) -> Self {
        Self::unavailable(e.to_string())
    }
}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        Self::unavailable(e.to_string())
    }
}
