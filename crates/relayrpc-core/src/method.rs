//! Method definitions: name + cache policy, and the request translator seam.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::transport::PeerRequest;

/// Named RPC parameters, as received from the transport layer.
pub type Params = Map<String, Value>;

/// Longest identifier accepted in a request path.
pub const MAX_ID_LEN: usize = 128;

/// A registered RPC method: its name and how long results are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcMethod {
    pub name: String,
    /// Zero disables caching for this method.
    pub cache_ttl: Duration,
}

impl RpcMethod {
    pub fn new(name: impl Into<String>, cache_ttl_secs: u64) -> Self {
        Self {
            name: name.into(),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
        }
    }

    pub fn is_cached(&self) -> bool {
        !self.cache_ttl.is_zero()
    }
}

/// A validated call, ready to be served from cache or sent to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    /// Pure function of the parameters; identical calls share an entry.
    pub cache_key: String,
    pub request: PeerRequest,
    /// Message reported when the peer has no such entity,
    /// e.g. `"Block 123 could not be found."`.
    pub not_found: String,
}

/// Turns RPC parameters into a [`PreparedCall`].
///
/// Runs before any cache lookup or network call, so all parameter
/// validation belongs here. Unknown parameters must be ignored.
pub trait RequestTranslator: Send + Sync + 'static {
    fn translate(&self, params: &Params) -> Result<PreparedCall, GatewayError>;
}

impl<F> RequestTranslator for F
where
    F: Fn(&Params) -> Result<PreparedCall, GatewayError> + Send + Sync + 'static,
{
    fn translate(&self, params: &Params) -> Result<PreparedCall, GatewayError> {
        self(params)
    }
}

/// Deserialize named parameters into a method's own parameter struct.
///
/// Missing or mistyped fields become a validation error; fields the struct
/// does not declare are ignored.
pub fn parse_params<T: DeserializeOwned>(params: &Params) -> Result<T, GatewayError> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| GatewayError::validation(format!("Invalid params: {e}")))
}

/// An identifier that is safe to embed in a request path.
///
/// Accepts a non-empty ASCII alphanumeric string of at most
/// [`MAX_ID_LEN`] characters, or an unsigned integer (a block height, say).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "RawId")]
pub struct EntityId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl TryFrom<RawId> for EntityId {
    type Error = String;

    fn try_from(raw: RawId) -> Result<Self, Self::Error> {
        match raw {
            RawId::Number(n) => Ok(Self(n.to_string())),
            RawId::Text(s) => Self::parse(&s),
        }
    }
}

impl EntityId {
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("identifier must not be empty".into());
        }
        if s.len() > MAX_ID_LEN {
            return Err(format!("identifier longer than {MAX_ID_LEN} characters"));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(format!("identifier {s:?} contains invalid characters"));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
