//! `wallets.*` methods.

use serde::Deserialize;

use relayrpc_core::error::GatewayError;
use relayrpc_core::mapper::{EmptyList, EntityMapper, PagedList};
use relayrpc_core::method::{parse_params, EntityId, Params, PreparedCall, RequestTranslator};
use relayrpc_core::transport::PeerRequest;

pub const INFO: &str = "wallets.info";
pub const TRANSACTIONS: &str = "wallets.transactions";

#[derive(Debug, Deserialize)]
struct WalletParams {
    address: EntityId,
}

#[derive(Debug, Deserialize)]
struct WalletTransactionsParams {
    address: EntityId,
    #[serde(default)]
    offset: Option<u64>,
}

fn wallet_not_found(address: &EntityId) -> String {
    format!("Wallet {address} could not be found.")
}

/// `wallets.info {address}` — `GET wallets/{address}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Info;

impl RequestTranslator for Info {
    fn translate(&self, params: &Params) -> Result<PreparedCall, GatewayError> {
        let WalletParams { address } = parse_params(params)?;
        Ok(PreparedCall {
            cache_key: address.to_string(),
            request: PeerRequest::get(format!("wallets/{address}")),
            not_found: wallet_not_found(&address),
        })
    }
}

pub fn info_mapper() -> EntityMapper {
    EntityMapper
}

/// `wallets.transactions {address, offset?}` — transactions sent or received
/// by a wallet, newest first. A wallet with no transactions is unknown to
/// the network, so an empty page is reported as not found.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transactions;

impl RequestTranslator for Transactions {
    fn translate(&self, params: &Params) -> Result<PreparedCall, GatewayError> {
        let WalletTransactionsParams { address, offset } = parse_params(params)?;
        Ok(PreparedCall {
            cache_key: format!("{address}:{}", offset.unwrap_or(0)),
            request: PeerRequest::get("transactions")
                .query_opt("offset", offset)
                .query("orderBy", "timestamp:desc")
                .query("ownerId", &address),
            not_found: wallet_not_found(&address),
        })
    }
}

pub fn transactions_mapper() -> PagedList {
    PagedList { empty: EmptyList::NotFound }
}
