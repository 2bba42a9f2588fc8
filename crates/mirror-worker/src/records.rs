//! Keys and document shapes written to the gateway.

use crate::{
    chain::ChainBlock,
    sanitize::sanitize,
};
use alloy::primitives::{
    Address,
    B256,
};
use mirror_store::Document;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

pub fn block_key(number: u64) -> String {
    number.to_string()
}

pub fn transaction_key(hash: &B256) -> String {
    hash.to_string()
}

/// Contracts are keyed by their checksummed address.
pub fn contract_key(address: &Address) -> String {
    address.to_checksum(None)
}

/// A persisted block. Transactions are stored separately and referenced by hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDocument {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    pub miner: Option<Address>,
    pub gas_used: Option<u64>,
    pub gas_limit: Option<u64>,
    pub base_fee_per_gas: Option<u64>,
    pub transactions: Vec<B256>,
}

impl From<&ChainBlock> for BlockDocument {
    fn from(block: &ChainBlock) -> Self {
        Self {
            number: block.number,
            hash: block.hash,
            parent_hash: block.parent_hash,
            timestamp: block.timestamp,
            miner: block.miner,
            gas_used: block.gas_used,
            gas_limit: block.gas_limit,
            base_fee_per_gas: block.base_fee_per_gas,
            transactions: block.transaction_hashes(),
        }
    }
}

/// Contract metadata. `name` and `abi` stay absent until an artifact matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractDocument {
    pub address: Address,
    pub name: Option<String>,
    pub abi: Option<Value>,
}

impl ContractDocument {
    pub fn stub(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        sanitize(self)
    }
}
