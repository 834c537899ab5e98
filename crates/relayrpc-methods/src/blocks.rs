//! `blocks.*` methods.

use serde::Deserialize;

use relayrpc_core::error::GatewayError;
use relayrpc_core::mapper::{EmptyList, EntityMapper, FirstOfList, PagedList};
use relayrpc_core::method::{parse_params, EntityId, Params, PreparedCall, RequestTranslator};
use relayrpc_core::transport::PeerRequest;

pub const LATEST: &str = "blocks.latest";
pub const INFO: &str = "blocks.info";
pub const TRANSACTIONS: &str = "blocks.transactions";

#[derive(Debug, Deserialize)]
struct BlockParams {
    id: EntityId,
}

#[derive(Debug, Deserialize)]
struct BlockTransactionsParams {
    id: EntityId,
    #[serde(default)]
    offset: Option<u64>,
}

fn block_not_found(id: &EntityId) -> String {
    format!("Block {id} could not be found.")
}

/// `blocks.latest` — the highest block the peer knows.
///
/// `GET blocks?orderBy=height:desc&limit=1`, result is the first element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Latest;

impl RequestTranslator for Latest {
    fn translate(&self, _params: &Params) -> Result<PreparedCall, GatewayError> {
        Ok(PreparedCall {
            cache_key: "latest".into(),
            request: PeerRequest::get("blocks")
                .query("orderBy", "height:desc")
                .query("limit", 1),
            not_found: "Latest block could not be found.".into(),
        })
    }
}

pub fn latest_mapper() -> FirstOfList {
    FirstOfList { empty: EmptyList::NotFound }
}

/// `blocks.info {id}` — one block by id or height.
#[derive(Debug, Clone, Copy, Default)]
pub struct Info;

impl RequestTranslator for Info {
    fn translate(&self, params: &Params) -> Result<PreparedCall, GatewayError> {
        let BlockParams { id } = parse_params(params)?;
        Ok(PreparedCall {
            cache_key: id.to_string(),
            request: PeerRequest::get(format!("blocks/{id}")),
            not_found: block_not_found(&id),
        })
    }
}

pub fn info_mapper() -> EntityMapper {
    EntityMapper
}

/// `blocks.transactions {id, offset?}` — transactions of one block, newest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transactions;

impl RequestTranslator for Transactions {
    fn translate(&self, params: &Params) -> Result<PreparedCall, GatewayError> {
        let BlockTransactionsParams { id, offset } = parse_params(params)?;
        Ok(PreparedCall {
            cache_key: format!("{id}:{}", offset.unwrap_or(0)),
            request: PeerRequest::get(format!("blocks/{id}/transactions"))
                .query("orderBy", "timestamp:desc")
                .query_opt("offset", offset),
            not_found: block_not_found(&id),
        })
    }
}

pub fn transactions_mapper() -> PagedList {
    PagedList { empty: EmptyList::NotFound }
}
