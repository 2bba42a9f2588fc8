//! Subscribe/reconnect lifecycle of the block feed.
//!
//! Every connection attempt runs the full sequence: connect, subscribe to new
//! heads, start a backfill pass and route each head to the synchronizer. Any
//! failure along the way drops back to `Disconnected`, waits a fixed delay
//! and starts over. There is no retry limit.

use crate::{
    backfill::Backfiller,
    chain::{
        ChainClient,
        ChainError,
        Connector,
    },
    critical,
    metrics,
    sync::BlockSynchronizer,
};
use alloy::rpc::types::BlockId;
use futures::StreamExt;
use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    time,
};
use tokio_util::{
    sync::CancellationToken,
    task::TaskTracker,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

pub struct ResilienceController {
    connector: Arc<dyn Connector>,
    synchronizer: BlockSynchronizer,
    backfiller: Backfiller,
    retry_delay: Duration,
    state: watch::Sender<ConnectionState>,
    /// Highest block number synced from the head subscription.
    synced_head: Arc<AtomicU64>,
}

impl ResilienceController {
    pub fn new(
        connector: Arc<dyn Connector>,
        synchronizer: BlockSynchronizer,
        backfiller: Backfiller,
        retry_delay: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            synchronizer,
            backfiller,
            retry_delay,
            state,
            synced_head: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Highest head synced so far, `0` before the first one.
    pub fn synced_head(&self) -> u64 {
        self.synced_head.load(Ordering::Relaxed)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Keep the feed alive until `cancel` fires.
    ///
    /// Block syncs already dispatched are awaited before returning, never aborted.
    pub async fn run(&self, cancel: CancellationToken) {
        let tracker = TaskTracker::new();

        loop {
            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                outcome = self.follow_heads(&tracker, &cancel) => outcome,
            };
            let err = match outcome {
                Ok(never) => match never {},
                Err(err) => err,
            };

            self.state.send_replace(ConnectionState::Disconnected);
            metrics::record_reconnect();
            warn!(
                error = %err,
                retry_in = ?self.retry_delay,
                "block subscription lost, reconnecting"
            );

            tokio::select! {
                () = cancel.cancelled() => break,
                () = time::sleep(self.retry_delay) => {}
            }
        }

        info!("Resilience controller received cancellation signal");
        self.state.send_replace(ConnectionState::Disconnected);
        tracker.close();
        tracker.wait().await;
    }

    /// One connection attempt. Only returns when the attempt fails.
    async fn follow_heads(
        &self,
        tracker: &TaskTracker,
        cancel: &CancellationToken,
    ) -> Result<Infallible, ChainError> {
        self.state.send_replace(ConnectionState::Connecting);
        let client = self.connector.connect().await?;
        let mut heads = client.subscribe_new_heads().await?;
        self.state.send_replace(ConnectionState::Subscribed);
        info!("subscribed to new block headers");

        self.spawn_backfill(tracker, client.clone(), cancel.clone());

        loop {
            match heads.next().await {
                Some(Ok(id)) => self.spawn_block_sync(tracker, client.clone(), id),
                Some(Err(err)) => return Err(err),
                None => return Err(ChainError::SubscriptionClosed),
            }
        }
    }

    fn spawn_backfill(
        &self,
        tracker: &TaskTracker,
        client: Arc<dyn ChainClient>,
        cancel: CancellationToken,
    ) {
        let backfiller = self.backfiller.clone();
        tracker.spawn(async move {
            match backfiller.run(client.as_ref(), &cancel).await {
                Ok(report) => {
                    info!(
                        latest = report.latest,
                        synced = report.synced,
                        failed = report.failed,
                        "backfill pass complete"
                    );
                }
                Err(err) => warn!(error = %err, "backfill pass failed"),
            }
        });
    }

    fn spawn_block_sync(&self, tracker: &TaskTracker, client: Arc<dyn ChainClient>, id: BlockId) {
        let synchronizer = self.synchronizer.clone();
        let synced_head = self.synced_head.clone();
        tracker.spawn(async move {
            match synchronizer.sync_block_by_id(client.as_ref(), id).await {
                Ok(report) => {
                    // Head syncs finish out of order; the gauge only moves forward.
                    let head = synced_head
                        .fetch_max(report.block_number, Ordering::Relaxed)
                        .max(report.block_number);
                    metrics::record_head(head);
                    debug!(?report, "synced head");
                }
                Err(err) => {
                    metrics::record_block_failure();
                    critical!(block = ?id, error = %err, "failed to sync new head");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeChain;
    use async_trait::async_trait;
    use futures::stream;
    use mirror_store::{
        Collection,
        MemoryGateway,
    };
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    const RETRY: Duration = Duration::from_secs(5);

    /// Hands out the scripted clients in order. `None` is a refused
    /// connection. Once the script is exhausted, connecting never completes.
    struct ScriptedConnector {
        script: Mutex<VecDeque<Option<Arc<FakeChain>>>>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl ScriptedConnector {
        fn new(script: impl IntoIterator<Item = Option<Arc<FakeChain>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                attempts: Mutex::default(),
            })
        }

        fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().clone()
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self) -> Result<Arc<dyn ChainClient>, ChainError> {
            self.attempts.lock().push(Instant::now());
            let next = self.script.lock().pop_front();
            match next {
                Some(Some(client)) => Ok(client as Arc<dyn ChainClient>),
                Some(None) => Err(ChainError::SubscriptionClosed),
                None => std::future::pending().await,
            }
        }
    }

    fn dropping_chain() -> Arc<FakeChain> {
        let chain = FakeChain::new();
        chain.set_heads(stream::iter([Err(ChainError::SubscriptionClosed)]).boxed());
        Arc::new(chain)
    }

    fn controller(connector: Arc<ScriptedConnector>, gateway: Arc<MemoryGateway>) -> Arc<ResilienceController> {
        let synchronizer = BlockSynchronizer::new(gateway.clone());
        let backfiller = Backfiller::new(gateway, synchronizer.clone(), 4);
        Arc::new(ResilienceController::new(connector, synchronizer, backfiller, RETRY))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_reconnect_after_delay() {
        let connector = ScriptedConnector::new([Some(dropping_chain()), Some(Arc::new(FakeChain::new()))]);
        let controller = controller(connector.clone(), Arc::new(MemoryGateway::new()));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let controller = controller.clone();
            let cancel = cancel.clone();
            async move { controller.run(cancel).await }
        });

        time::sleep(RETRY / 2).await;
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(controller.state(), ConnectionState::Disconnected);

        time::sleep(RETRY * 3).await;
        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1] - attempts[0] >= RETRY);
        assert_eq!(controller.state(), ConnectionState::Subscribed);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(controller.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_is_retried() {
        let connector = ScriptedConnector::new([None, None, Some(Arc::new(FakeChain::new()))]);
        let controller = controller(connector.clone(), Arc::new(MemoryGateway::new()));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let controller = controller.clone();
            let cancel = cancel.clone();
            async move { controller.run(cancel).await }
        });

        time::sleep(RETRY * 10).await;
        assert_eq!(connector.attempts().len(), 3);
        assert_eq!(controller.state(), ConnectionState::Subscribed);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heads_are_routed_to_synchronizer() {
        let chain = FakeChain::with_blocks(3);
        // Head says nothing is missing, so only the routed header is synced.
        chain.set_latest(0);
        chain.set_heads(
            stream::iter([Ok(BlockId::number(3))])
                .chain(stream::pending())
                .boxed(),
        );
        let gateway = Arc::new(MemoryGateway::new());
        let controller = controller(ScriptedConnector::new([Some(Arc::new(chain))]), gateway.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let controller = controller.clone();
            let cancel = cancel.clone();
            async move { controller.run(cancel).await }
        });

        let mut state = controller.subscribe_state();
        state
            .wait_for(|state| *state == ConnectionState::Subscribed)
            .await
            .unwrap();
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(gateway.len(Collection::Blocks), 1);
        assert_eq!(gateway.len(Collection::Transactions), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_synced_head_tracks_highest_routed_block() {
        let chain = FakeChain::with_blocks(3);
        chain.set_latest(0);
        chain.set_heads(
            stream::iter([Ok(BlockId::number(3)), Ok(BlockId::number(2))])
                .chain(stream::pending())
                .boxed(),
        );
        let controller = controller(
            ScriptedConnector::new([Some(Arc::new(chain))]),
            Arc::new(MemoryGateway::new()),
        );
        assert_eq!(controller.synced_head(), 0);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let controller = controller.clone();
            let cancel = cancel.clone();
            async move { controller.run(cancel).await }
        });

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.synced_head(), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_runs_on_every_subscription() {
        let gateway = Arc::new(MemoryGateway::new());
        let first = FakeChain::with_blocks(2);
        first.set_heads(stream::iter([Err(ChainError::SubscriptionClosed)]).boxed());
        let second = FakeChain::with_blocks(4);

        let connector = ScriptedConnector::new([Some(Arc::new(first)), Some(Arc::new(second))]);
        let controller = controller(connector, gateway.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let controller = controller.clone();
            let cancel = cancel.clone();
            async move { controller.run(cancel).await }
        });

        time::sleep(RETRY * 2).await;
        assert_eq!(gateway.len(Collection::Blocks), 4);

        cancel.cancel();
        handle.await.unwrap();
    }
}
