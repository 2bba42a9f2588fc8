//! Narrow view of an execution node used by the sync engine.

mod rpc;
mod types;

pub use rpc::{
    AlloyChainClient,
    AlloyConnector,
};
pub use types::{
    ChainBlock,
    ChainLog,
    ChainReceipt,
    ChainTransaction,
};

use alloy::{
    primitives::B256,
    rpc::types::BlockId,
    transports::TransportError,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// New-head notifications. An `Err` item ends the subscription.
pub type HeadStream = BoxStream<'static, Result<BlockId, ChainError>>;

#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Block subscription closed by the node")]
    SubscriptionClosed,
    #[error("Unsupported endpoint scheme: {0}")]
    UnsupportedEndpoint(String),
    #[error("Invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Subscribe to new block headers.
    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError>;

    /// Fetch a block with full transaction bodies.
    async fn get_block(&self, id: BlockId) -> Result<Option<ChainBlock>, ChainError>;

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, ChainError>;

    async fn latest_block_number(&self) -> Result<u64, ChainError>;
}

/// Builds a fresh [`ChainClient`] for every connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ChainClient>, ChainError>;
}
