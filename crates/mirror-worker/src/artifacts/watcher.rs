use super::{
    ArtifactError,
    ArtifactResolver,
    ContractUpdate,
};
use crate::metrics;
use mirror_store::Gateway;
use notify::{
    Event,
    EventKind,
    RecommendedWatcher,
    RecursiveMode,
    Watcher,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use tokio::sync::mpsc;
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
pub enum ArtifactEventKind {
    Added,
    Changed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEvent {
    pub kind: ArtifactEventKind,
    pub path: PathBuf,
}

fn is_artifact(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Filesystem notifier for an artifacts directory.
///
/// Files already present when the watcher starts are reported as `Added`.
pub struct ArtifactWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<ArtifactEvent>,
}

impl ArtifactWatcher {
    pub fn start(dir: &Path) -> Result<Self, ArtifactError> {
        let (tx, events) = mpsc::unbounded_channel();

        let io_error = |source| {
            ArtifactError::Io {
                path: dir.to_path_buf(),
                source,
            }
        };
        std::fs::create_dir_all(dir).map_err(io_error)?;

        let notifier = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "artifact watcher error");
                    return;
                }
            };
            let kind = match event.kind {
                EventKind::Create(_) => ArtifactEventKind::Added,
                EventKind::Modify(_) => ArtifactEventKind::Changed,
                _ => return,
            };
            for path in event.paths.into_iter().filter(|path| is_artifact(path)) {
                let _ = notifier.send(ArtifactEvent { kind, path });
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        // Scan after watching: a file written in between is reported twice, never lost.
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if is_artifact(&path) {
                let _ = tx.send(ArtifactEvent {
                    kind: ArtifactEventKind::Added,
                    path,
                });
            }
        }
        info!(dir = %dir.display(), "watching build artifacts");

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }

    /// Split into the notifier guard and its event receiver. Dropping the
    /// guard stops the notifications.
    pub fn into_parts(self) -> (RecommendedWatcher, mpsc::UnboundedReceiver<ArtifactEvent>) {
        (self._watcher, self.events)
    }
}

/// Resolves and persists artifacts as their change events arrive.
#[derive(Clone)]
pub struct ArtifactPipeline {
    resolver: Arc<ArtifactResolver>,
    gateway: Arc<dyn Gateway>,
}

impl ArtifactPipeline {
    pub fn new(resolver: Arc<ArtifactResolver>, gateway: Arc<dyn Gateway>) -> Self {
        Self { resolver, gateway }
    }

    /// Added and changed files are handled the same way. The address is only
    /// remembered once persisted, so a failed write is retried by the next event.
    pub async fn handle(&self, event: &ArtifactEvent) -> Result<Option<ContractUpdate>, ArtifactError> {
        let Some(update) = self.resolver.resolve_artifact(&event.path).await? else {
            return Ok(None);
        };
        update.persist(self.gateway.as_ref()).await?;
        self.resolver.commit(&update);
        metrics::record_artifact_resolved();
        Ok(Some(update))
    }

    /// Process events concurrently until cancelled or the notifier goes away.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<ArtifactEvent>, cancel: CancellationToken) {
        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Artifact pipeline received cancellation signal");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("artifact notifier closed");
                        break;
                    };
                    let pipeline = self.clone();
                    tracker.spawn(async move {
                        if let Err(err) = pipeline.handle(&event).await {
                            metrics::record_artifact_failure();
                            warn!(path = %event.path.display(), error = %err, "failed to process artifact");
                        }
                    });
                }
            }
        }

        tracker.close();
        tracker.wait().await;
    }
}
