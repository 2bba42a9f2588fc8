//! [`ChainClient`] over an alloy `RootProvider`.

use super::{
    ChainBlock,
    ChainClient,
    ChainError,
    ChainLog,
    ChainReceipt,
    ChainTransaction,
    Connector,
    HeadStream,
};
use crate::config::Transport;
use alloy::{
    consensus::Transaction as ConsensusTransaction,
    network::{
        ReceiptResponse,
        TransactionResponse,
    },
    primitives::B256,
    rpc::types::{
        Block,
        BlockId,
        Transaction,
        TransactionReceipt,
    },
};
use alloy_provider::{
    Provider,
    ProviderBuilder,
    RootProvider,
    WsConnect,
};
use async_trait::async_trait;
use futures::{
    StreamExt,
    stream,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tracing::info;
use url::Url;

/// Opens a provider for the configured endpoint on every attempt.
#[derive(Debug, Clone)]
pub struct AlloyConnector {
    endpoint: Url,
    transport: Transport,
    poll_interval: Duration,
}

impl AlloyConnector {
    pub fn new(rpc_server: &str, poll_interval: Duration) -> Result<Self, ChainError> {
        let endpoint = Url::parse(rpc_server)?;
        let transport = Transport::from_url(&endpoint)?;
        Ok(Self {
            endpoint,
            transport,
            poll_interval,
        })
    }

    pub const fn transport(&self) -> Transport {
        self.transport
    }
}

#[async_trait]
impl Connector for AlloyConnector {
    async fn connect(&self) -> Result<Arc<dyn ChainClient>, ChainError> {
        let provider = match self.transport {
            Transport::Streaming => {
                ProviderBuilder::new()
                    .connect_ws(WsConnect::new(self.endpoint.as_str()))
                    .await?
                    .root()
                    .clone()
            }
            Transport::Polling => {
                ProviderBuilder::new()
                    .connect_http(self.endpoint.clone())
                    .root()
                    .clone()
            }
        };
        info!(endpoint = %self.endpoint, transport = ?self.transport, "connected to node");

        Ok(Arc::new(AlloyChainClient {
            provider,
            transport: self.transport,
            poll_interval: self.poll_interval,
        }))
    }
}

pub struct AlloyChainClient {
    provider: RootProvider,
    transport: Transport,
    poll_interval: Duration,
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError> {
        match self.transport {
            Transport::Streaming => {
                let subscription = self.provider.subscribe_blocks().await?;
                Ok(subscription
                    .into_stream()
                    .map(|header| Ok(BlockId::number(header.inner.number)))
                    .boxed())
            }
            Transport::Polling => {
                // Block filters only report hashes.
                let poller = self
                    .provider
                    .watch_blocks()
                    .await?
                    .with_poll_interval(self.poll_interval);
                Ok(poller
                    .into_stream()
                    .flat_map(|hashes| stream::iter(hashes.into_iter().map(|hash| Ok(BlockId::hash(hash)))))
                    .boxed())
            }
        }
    }

    async fn get_block(&self, id: BlockId) -> Result<Option<ChainBlock>, ChainError> {
        let block = self.provider.get_block(id).full().await?;
        Ok(block.map(convert_block))
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, ChainError> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.map(convert_receipt))
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?)
    }
}

fn convert_block(block: Block) -> ChainBlock {
    let Block {
        header,
        transactions,
        ..
    } = block;

    ChainBlock {
        number: header.inner.number,
        hash: header.hash,
        parent_hash: header.inner.parent_hash,
        timestamp: header.inner.timestamp,
        miner: Some(header.inner.beneficiary),
        gas_used: Some(header.inner.gas_used),
        gas_limit: Some(header.inner.gas_limit),
        base_fee_per_gas: header.inner.base_fee_per_gas,
        transactions: transactions
            .into_transactions()
            .map(convert_transaction)
            .collect(),
    }
}

fn convert_transaction(tx: Transaction) -> ChainTransaction {
    ChainTransaction {
        hash: TransactionResponse::tx_hash(&tx),
        from: TransactionResponse::from(&tx),
        to: ConsensusTransaction::to(&tx),
        input: Some(ConsensusTransaction::input(&tx).clone()),
        value: Some(ConsensusTransaction::value(&tx)),
        nonce: Some(ConsensusTransaction::nonce(&tx)),
        gas: Some(ConsensusTransaction::gas_limit(&tx)),
        gas_price: tx
            .effective_gas_price
            .or_else(|| ConsensusTransaction::gas_price(&tx)),
        block_number: tx.block_number,
        block_hash: tx.block_hash,
        transaction_index: tx.transaction_index,
    }
}

fn convert_receipt(receipt: TransactionReceipt) -> ChainReceipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| {
            ChainLog {
                address: log.inner.address,
                topics: log.inner.data.topics().to_vec(),
                data: log.inner.data.data.clone(),
                log_index: log.log_index,
            }
        })
        .collect();

    ChainReceipt {
        transaction_hash: receipt.transaction_hash,
        status: ReceiptResponse::status(&receipt),
        gas_used: Some(receipt.gas_used),
        contract_address: receipt.contract_address,
        logs,
    }
}
