//! `transactions.*` methods.

use serde::Deserialize;

use relayrpc_core::error::GatewayError;
use relayrpc_core::mapper::EntityMapper;
use relayrpc_core::method::{parse_params, EntityId, Params, PreparedCall, RequestTranslator};
use relayrpc_core::transport::PeerRequest;

pub const INFO: &str = "transactions.info";

#[derive(Debug, Deserialize)]
struct TransactionParams {
    id: EntityId,
}

/// `transactions.info {id}` — `GET transactions/{id}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Info;

impl RequestTranslator for Info {
    fn translate(&self, params: &Params) -> Result<PreparedCall, GatewayError> {
        let TransactionParams { id } = parse_params(params)?;
        Ok(PreparedCall {
            cache_key: id.to_string(),
            request: PeerRequest::get(format!("transactions/{id}")),
            not_found: format!("Transaction {id} could not be found."),
        })
    }
}

pub fn info_mapper() -> EntityMapper {
    EntityMapper
}
