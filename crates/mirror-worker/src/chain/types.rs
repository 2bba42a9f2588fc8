//! Chain data as the engine sees it, independent of the RPC client.

use alloy::primitives::{
    Address,
    B256,
    Bytes,
    U256,
};
use serde::{
    Deserialize,
    Serialize,
};

/// A block fetched with its full transaction bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBlock {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    pub miner: Option<Address>,
    pub gas_used: Option<u64>,
    pub gas_limit: Option<u64>,
    pub base_fee_per_gas: Option<u64>,
    pub transactions: Vec<ChainTransaction>,
}

impl ChainBlock {
    pub fn transaction_hashes(&self) -> Vec<B256> {
        self.transactions.iter().map(|tx| tx.hash).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransaction {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub input: Option<Bytes>,
    pub value: Option<U256>,
    pub nonce: Option<u64>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub transaction_index: Option<u64>,
}

impl ChainTransaction {
    pub const fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReceipt {
    pub transaction_hash: B256,
    pub status: bool,
    pub gas_used: Option<u64>,
    /// Set when the transaction deployed a contract.
    pub contract_address: Option<Address>,
    pub logs: Vec<ChainLog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub log_index: Option<u64>,
}
