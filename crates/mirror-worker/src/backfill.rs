//! Gap detection over persisted block numbers and backfill of the missing ones.

use crate::{
    chain::ChainClient,
    metrics,
    sync::{
        BlockSynchronizer,
        SyncError,
    },
};
use alloy::rpc::types::BlockId;
use futures::{
    StreamExt,
    future,
    stream,
};
use mirror_store::{
    Collection,
    Direction,
    Gateway,
    StoreError,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{
    debug,
    info,
    warn,
};

/// Block numbers in `[1, max(latest, last persisted)]` that are not in `persisted`.
///
/// `persisted` must be sorted ascending. A single pass walks every target
/// alongside a cursor into `persisted`. Genesis is never a target.
pub fn compute_missing(persisted: &[u64], latest: u64) -> Vec<u64> {
    let upper = persisted.last().copied().unwrap_or_default().max(latest);
    let mut cursor = persisted.iter().copied().peekable();
    let mut missing = Vec::new();

    for target in 1..=upper {
        while cursor.next_if(|&number| number < target).is_some() {}
        if cursor.next_if_eq(&target).is_some() {
            continue;
        }
        missing.push(target);
    }
    missing
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub latest: u64,
    pub missing: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Fetches every block missing from the store, up to `concurrency` at a time.
#[derive(Clone)]
pub struct Backfiller {
    gateway: Arc<dyn Gateway>,
    synchronizer: BlockSynchronizer,
    concurrency: usize,
}

impl Backfiller {
    pub fn new(gateway: Arc<dyn Gateway>, synchronizer: BlockSynchronizer, concurrency: usize) -> Self {
        Self {
            gateway,
            synchronizer,
            concurrency: concurrency.max(1),
        }
    }

    /// Persisted block numbers, ascending. Derived from the block collection
    /// on every call.
    pub async fn persisted_block_numbers(&self) -> Result<Vec<u64>, StoreError> {
        let blocks = self
            .gateway
            .list(Collection::Blocks, "number", Direction::Ascending)
            .await?;
        Ok(blocks
            .iter()
            .filter_map(|block| block.get("number").and_then(Value::as_u64))
            .collect())
    }

    /// One backfill pass against the node's current head.
    ///
    /// Failed blocks are logged and left for the next pass. Cancellation
    /// stops new fetches; fetches already in flight run to completion.
    pub async fn run(
        &self,
        client: &dyn ChainClient,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, SyncError> {
        let latest = client.latest_block_number().await?;
        metrics::record_head(latest);

        let persisted = self.persisted_block_numbers().await?;
        let missing = compute_missing(&persisted, latest);
        metrics::record_backfill(missing.len());
        info!(latest, persisted = persisted.len(), missing = missing.len(), "starting backfill");

        let mut report = BackfillReport {
            latest,
            missing: missing.len(),
            ..Default::default()
        };

        let outcomes: Vec<bool> = stream::iter(missing)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|block_number| {
                async move {
                    match self
                        .synchronizer
                        .sync_block_by_id(client, BlockId::number(block_number))
                        .await
                    {
                        Ok(_) => true,
                        Err(err) => {
                            metrics::record_block_failure();
                            warn!(block_number, error = %err, "failed to backfill block");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        report.synced = outcomes.iter().filter(|synced| **synced).count();
        report.failed = outcomes.len() - report.synced;
        debug!(?report, "backfill pass finished");
        Ok(report)
    }
}
