//! Response mappers: peer HTTP outcome → RPC result or typed error.
//!
//! All mappers share one taxonomy:
//!
//! | Peer outcome                  | RPC outcome                  |
//! |-------------------------------|------------------------------|
//! | 2xx with the expected body    | success                      |
//! | 2xx with an empty list        | per [`EmptyList`] policy     |
//! | 404                           | `EntityNotFound`             |
//! | any other status              | `Upstream` with that status  |
//! | 2xx with a malformed body     | `Upstream` with that status  |

use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::method::PreparedCall;
use crate::transport::PeerResponse;

/// Converts a peer response into the method's result.
pub trait ResponseMapper: Send + Sync + 'static {
    fn map(&self, call: &PreparedCall, response: PeerResponse) -> Result<Value, GatewayError>;
}

impl<F> ResponseMapper for F
where
    F: Fn(&PreparedCall, PeerResponse) -> Result<Value, GatewayError> + Send + Sync + 'static,
{
    fn map(&self, call: &PreparedCall, response: PeerResponse) -> Result<Value, GatewayError> {
        self(call, response)
    }
}

/// What an empty `data` array means for a list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyList {
    /// The entity (or filter target) does not exist.
    NotFound,
    /// An empty list is a valid answer.
    Allow,
}

/// The `{data, meta}` envelope of a successful peer response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub status: u16,
    pub data: Value,
    pub meta: Option<Value>,
}

impl Envelope {
    /// Apply the status part of the taxonomy and split a 2xx body into its
    /// `data` and `meta` fields.
    pub fn open(call: &PreparedCall, response: PeerResponse) -> Result<Self, GatewayError> {
        let status = response.status;
        if status == 404 {
            return Err(GatewayError::not_found(&call.not_found));
        }
        if !response.is_success() {
            return Err(GatewayError::upstream(status, "unexpected status"));
        }
        let Value::Object(mut body) = response.body else {
            return Err(GatewayError::upstream(status, "response body is not a JSON object"));
        };
        let data = body
            .remove("data")
            .ok_or_else(|| GatewayError::upstream(status, "response has no data field"))?;
        Ok(Self {
            status,
            data,
            meta: body.remove("meta"),
        })
    }

    fn into_list(self) -> Result<(Vec<Value>, Option<Value>), GatewayError> {
        match self.data {
            Value::Array(items) => Ok((items, self.meta)),
            _ => Err(GatewayError::upstream(self.status, "data is not a list")),
        }
    }
}

/// Single-entity endpoint: result is `data`. A null `data` is not found.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityMapper;

impl ResponseMapper for EntityMapper {
    fn map(&self, call: &PreparedCall, response: PeerResponse) -> Result<Value, GatewayError> {
        let envelope = Envelope::open(call, response)?;
        if envelope.data.is_null() {
            return Err(GatewayError::not_found(&call.not_found));
        }
        Ok(envelope.data)
    }
}

/// List endpoint queried for one entity: result is the first element.
#[derive(Debug, Clone, Copy)]
pub struct FirstOfList {
    pub empty: EmptyList,
}

impl ResponseMapper for FirstOfList {
    fn map(&self, call: &PreparedCall, response: PeerResponse) -> Result<Value, GatewayError> {
        let (items, _) = Envelope::open(call, response)?.into_list()?;
        match (items.into_iter().next(), self.empty) {
            (Some(first), _) => Ok(first),
            (None, EmptyList::NotFound) => Err(GatewayError::not_found(&call.not_found)),
            (None, EmptyList::Allow) => Ok(Value::Null),
        }
    }
}

/// Paginated list endpoint: result is `{count, data}` where `count` is the
/// peer's `meta.totalCount`, falling back to the page length.
#[derive(Debug, Clone, Copy)]
pub struct PagedList {
    pub empty: EmptyList,
}

impl ResponseMapper for PagedList {
    fn map(&self, call: &PreparedCall, response: PeerResponse) -> Result<Value, GatewayError> {
        let (items, meta) = Envelope::open(call, response)?.into_list()?;
        if items.is_empty() && self.empty == EmptyList::NotFound {
            return Err(GatewayError::not_found(&call.not_found));
        }
        let count = meta
            .as_ref()
            .and_then(|m| m.get("totalCount"))
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);
        Ok(json!({ "count": count, "data": items }))
    }
}
