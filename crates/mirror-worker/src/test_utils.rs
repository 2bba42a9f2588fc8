//! In-process chain double shared by the unit tests.

#![allow(dead_code)]

use crate::chain::{
    ChainBlock,
    ChainClient,
    ChainError,
    ChainReceipt,
    ChainTransaction,
    HeadStream,
};
use alloy::{
    primitives::{
        Address,
        B256,
        Bytes,
        U256,
        address,
    },
    rpc::types::{
        BlockId,
        BlockNumberOrTag,
    },
};
use alloy_dyn_abi::{
    DynSolValue,
    JsonAbiExt,
};
use alloy_json_abi::JsonAbi;
use async_trait::async_trait;
use futures::{
    StreamExt,
    stream,
};
use parking_lot::Mutex;
use serde_json::{
    Value,
    json,
};
use std::collections::{
    HashMap,
    HashSet,
};

/// Serves blocks and receipts from memory. Receipts are synthesized for every
/// transaction hash unless dropped.
#[derive(Default)]
pub struct FakeChain {
    blocks: Mutex<HashMap<u64, ChainBlock>>,
    latest: Mutex<Option<u64>>,
    failing_blocks: Mutex<HashSet<u64>>,
    dropped_receipts: Mutex<HashSet<B256>>,
    created: Mutex<HashMap<B256, Address>>,
    heads: Mutex<Option<HeadStream>>,
    requested: Mutex<Vec<u64>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain holding blocks `1..=latest`, each with a single transaction.
    pub fn with_blocks(latest: u64) -> Self {
        let chain = Self::new();
        for number in 1..=latest {
            let seed = u8::try_from(number % 250).unwrap_or_default();
            chain.add_block(block(number, vec![call_tx(seed, Address::ZERO, vec![])]));
        }
        chain
    }

    pub fn add_block(&self, block: ChainBlock) {
        self.blocks.lock().insert(block.number, block);
    }

    pub fn set_latest(&self, latest: u64) {
        *self.latest.lock() = Some(latest);
    }

    /// `get_block` for `number` fails with a transport error.
    pub fn fail_block(&self, number: u64) {
        self.failing_blocks.lock().insert(number);
    }

    pub fn drop_receipt(&self, hash: B256) {
        self.dropped_receipts.lock().insert(hash);
    }

    pub fn set_created_contract(&self, tx_hash: B256, address: Address) {
        self.created.lock().insert(tx_hash, address);
    }

    pub fn set_heads(&self, heads: HeadStream) {
        *self.heads.lock() = Some(heads);
    }

    /// Block numbers requested through `get_block`, in request order.
    pub fn requested_blocks(&self) -> Vec<u64> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError> {
        Ok(self
            .heads
            .lock()
            .take()
            .unwrap_or_else(|| stream::pending().boxed()))
    }

    async fn get_block(&self, id: BlockId) -> Result<Option<ChainBlock>, ChainError> {
        let blocks = self.blocks.lock();
        let found = match id {
            BlockId::Number(BlockNumberOrTag::Number(number)) => blocks.get(&number).cloned(),
            BlockId::Hash(hash) => {
                blocks
                    .values()
                    .find(|block| block.hash == hash.block_hash)
                    .cloned()
            }
            BlockId::Number(_) => blocks.values().max_by_key(|block| block.number).cloned(),
        };

        if let Some(block) = &found {
            self.requested.lock().push(block.number);
            if self.failing_blocks.lock().contains(&block.number) {
                return Err(ChainError::SubscriptionClosed);
            }
        }
        Ok(found)
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, ChainError> {
        if self.dropped_receipts.lock().contains(&hash) {
            return Ok(None);
        }
        Ok(Some(ChainReceipt {
            transaction_hash: hash,
            status: true,
            gas_used: Some(21_000),
            contract_address: self.created.lock().get(&hash).copied(),
            logs: Vec::new(),
        }))
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        if let Some(latest) = *self.latest.lock() {
            return Ok(latest);
        }
        Ok(self.blocks.lock().keys().max().copied().unwrap_or_default())
    }
}

pub fn block(number: u64, transactions: Vec<ChainTransaction>) -> ChainBlock {
    ChainBlock {
        number,
        hash: B256::left_padding_from(&(number + 1_000).to_be_bytes()),
        parent_hash: B256::left_padding_from(&(number + 999).to_be_bytes()),
        timestamp: 1_700_000_000 + number * 12,
        miner: Some(Address::ZERO),
        gas_used: Some(21_000),
        gas_limit: Some(30_000_000),
        base_fee_per_gas: None,
        transactions,
    }
}

pub fn call_tx(seed: u8, to: Address, input: Vec<u8>) -> ChainTransaction {
    ChainTransaction {
        hash: B256::repeat_byte(seed),
        from: Address::repeat_byte(0x11),
        to: Some(to),
        input: Some(Bytes::from(input)),
        value: Some(U256::ZERO),
        nonce: Some(0),
        gas: Some(21_000),
        gas_price: Some(1_000_000_000),
        block_number: None,
        block_hash: None,
        transaction_index: None,
    }
}

pub fn creation_tx(seed: u8) -> ChainTransaction {
    ChainTransaction {
        to: None,
        input: Some(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52])),
        ..call_tx(seed, Address::ZERO, Vec::new())
    }
}

/// Token ABI with a named `transfer` and an unnamed-argument `burn`.
pub fn token_abi() -> Value {
    json!([
        {
            "type": "function",
            "name": "transfer",
            "inputs": [
                { "name": "to", "type": "address", "internalType": "address" },
                { "name": "amount", "type": "uint256", "internalType": "uint256" }
            ],
            "outputs": [{ "name": "", "type": "bool", "internalType": "bool" }],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "burn",
            "inputs": [{ "name": "", "type": "uint256", "internalType": "uint256" }],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ])
}

pub fn transfer_calldata() -> Vec<u8> {
    let abi: JsonAbi = serde_json::from_value(token_abi()).unwrap();
    let transfer = abi.function("transfer").unwrap().first().unwrap();
    transfer
        .abi_encode_input(&[
            DynSolValue::Address(address!("0x00000000000000000000000000000000000000aa")),
            DynSolValue::Uint(U256::from(5), 256),
        ])
        .unwrap()
}
