//! Persists a fetched block and each of its transactions.
//!
//! Every transaction is handled as an independent unit: fetch the receipt,
//! decode the called function, write the transaction and, for contract
//! creations, a stub contract record. A failing transaction is logged and does
//! not affect its siblings. The block record is written last and only when all
//! of its transactions made it, so a block missing from the store is the signal
//! that backfill has to fetch it again.

use crate::{
    chain::{
        ChainBlock,
        ChainClient,
        ChainError,
        ChainTransaction,
    },
    metrics,
    records::{
        BlockDocument,
        ContractDocument,
        block_key,
        contract_key,
        transaction_key,
    },
    sanitize::sanitize,
    signature::{
        SignatureError,
        SignatureResolver,
    },
};
use alloy::{
    primitives::B256,
    rpc::types::BlockId,
};
use futures::future::join_all;
use mirror_store::{
    Collection,
    Gateway,
    StoreError,
    UpsertOptions,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("Failed to persist: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Block {0:?} not found on chain")]
    BlockNotFound(BlockId),
    #[error("Receipt for transaction {0} not found")]
    ReceiptNotFound(B256),
    #[error("Block {block_number} left unsynced, {failed} transaction(s) failed")]
    IncompleteBlock { block_number: u64, failed: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSyncReport {
    pub block_number: u64,
    pub transactions_synced: usize,
}

#[derive(Clone)]
pub struct BlockSynchronizer {
    gateway: Arc<dyn Gateway>,
    signatures: SignatureResolver,
}

impl BlockSynchronizer {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            signatures: SignatureResolver::new(gateway.clone()),
            gateway,
        }
    }

    /// Fetch a block by number or hash and sync it.
    pub async fn sync_block_by_id(
        &self,
        client: &dyn ChainClient,
        id: BlockId,
    ) -> Result<BlockSyncReport, SyncError> {
        let block = client
            .get_block(id)
            .await?
            .ok_or(SyncError::BlockNotFound(id))?;
        self.sync_block(client, block).await
    }

    /// Sync all transactions of `block` concurrently, then persist the block.
    ///
    /// If any transaction fails the block is not written and
    /// [`SyncError::IncompleteBlock`] is returned; the transactions that did
    /// succeed stay stored and are rewritten identically on the next attempt.
    pub async fn sync_block(
        &self,
        client: &dyn ChainClient,
        block: ChainBlock,
    ) -> Result<BlockSyncReport, SyncError> {
        let results = join_all(
            block
                .transactions
                .iter()
                .map(|tx| self.sync_transaction(client, tx, block.timestamp)),
        )
        .await;

        let mut report = BlockSyncReport {
            block_number: block.number,
            ..Default::default()
        };
        let mut failed = 0;
        for (tx, result) in block.transactions.iter().zip(results) {
            match result {
                Ok(()) => {
                    report.transactions_synced += 1;
                    metrics::record_transaction_synced();
                }
                Err(err) => {
                    failed += 1;
                    metrics::record_transaction_failure();
                    warn!(block_number = block.number, tx_hash = %tx.hash, error = %err, "failed to sync transaction");
                }
            }
        }
        if failed > 0 {
            return Err(SyncError::IncompleteBlock {
                block_number: block.number,
                failed,
            });
        }

        let document = sanitize(&BlockDocument::from(&block))?;
        self.gateway
            .upsert(
                Collection::Blocks,
                &block_key(block.number),
                document,
                UpsertOptions::REPLACE,
            )
            .await?;

        metrics::record_block_synced();
        info!(
            block_number = block.number,
            transactions = report.transactions_synced,
            "block synced"
        );
        Ok(report)
    }

    /// Receipt, signature, then the merged transaction record.
    pub async fn sync_transaction(
        &self,
        client: &dyn ChainClient,
        tx: &ChainTransaction,
        timestamp: u64,
    ) -> Result<(), SyncError> {
        let receipt = client
            .get_transaction_receipt(tx.hash)
            .await?
            .ok_or(SyncError::ReceiptNotFound(tx.hash))?;

        let mut document = sanitize(tx)?;
        document.insert("receipt".to_string(), Value::Object(sanitize(&receipt)?));
        document.insert("timestamp".to_string(), Value::from(timestamp));

        if let (Some(to), Some(input), Some(value)) = (tx.to, tx.input.as_ref(), tx.value) {
            let signature = match self.signatures.resolve_signature(to, input, value).await {
                Ok(signature) => signature,
                Err(SignatureError::Decode(err)) => {
                    debug!(tx_hash = %tx.hash, error = %err, "call data did not decode");
                    None
                }
                Err(SignatureError::Store(err)) => {
                    warn!(tx_hash = %tx.hash, error = %err, "failed to read contract for signature");
                    None
                }
            };
            document.insert(
                "functionSignature".to_string(),
                signature.map_or(Value::Null, Value::String),
            );
        }

        self.gateway
            .upsert(
                Collection::Transactions,
                &transaction_key(&tx.hash),
                document,
                UpsertOptions::REPLACE,
            )
            .await?;

        if tx.is_contract_creation() {
            match receipt.contract_address {
                Some(address) => {
                    self.gateway
                        .upsert(
                            Collection::Contracts,
                            &contract_key(&address),
                            ContractDocument::stub(address).to_document()?,
                            UpsertOptions::MERGE,
                        )
                        .await?;
                    debug!(tx_hash = %tx.hash, %address, "recorded created contract");
                }
                None => debug!(tx_hash = %tx.hash, "creation receipt carries no contract address"),
            }
        }

        Ok(())
    }
}
