#![doc = include_str!("../README.md")]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::unreachable)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![warn(clippy::indexing_slicing)]
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::indexing_slicing))]

pub mod artifacts;
pub mod backfill;
pub mod chain;
pub mod cli;
pub mod config;
pub mod controller;
mod macros;
mod metrics;
pub mod records;
pub mod sanitize;
pub mod signature;
pub mod sync;
#[cfg(test)]
mod test_utils;

pub use config::{
    Config,
    Workspace,
};

use crate::{
    artifacts::{
        AddressCache,
        ArtifactPipeline,
        ArtifactResolver,
        ArtifactWatcher,
        ProjectLayout,
    },
    backfill::Backfiller,
    chain::AlloyConnector,
    controller::ResilienceController,
    sync::BlockSynchronizer,
};

use anyhow::{
    Context,
    Result,
    anyhow,
};
use directories::ProjectDirs;
use mirror_store::{
    Gateway,
    SledGateway,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the block feed and the artifact watcher until `cancel` fires.
///
/// Either half is skipped when it is not configured.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<()> {
    let workspace = config.workspace();
    let db_path = database_path(&config)?;
    info!(workspace = %workspace.name, db_path = %db_path.display(), "opening store");
    let store = Arc::new(
        SledGateway::open(&db_path, &workspace.name)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    let gateway: Arc<dyn Gateway> = store.clone();

    let blocks = async {
        if !config.listen_transactions {
            info!("transaction listening disabled");
            return Ok(());
        }
        let connector = AlloyConnector::new(&workspace.rpc_server, config.poll_interval)
            .with_context(|| format!("invalid rpc server: {}", workspace.rpc_server))?;
        info!(rpc_server = %workspace.rpc_server, transport = ?connector.transport(), "starting block feed");

        let synchronizer = BlockSynchronizer::new(gateway.clone());
        let backfiller = Backfiller::new(gateway.clone(), synchronizer.clone(), config.backfill_concurrency);
        ResilienceController::new(Arc::new(connector), synchronizer, backfiller, config.retry_delay)
            .run(cancel.clone())
            .await;
        Ok::<_, anyhow::Error>(())
    };

    let artifacts = async {
        let Some(root) = config.project_root.as_deref() else {
            info!("no project root, artifact watching disabled");
            return Ok(());
        };
        watch_artifacts(root, &workspace, gateway.clone(), cancel.clone()).await
    };

    // The block feed only returns on cancellation, so a failing half must end the run.
    tokio::try_join!(blocks, artifacts)?;

    store.flush().context("failed to flush database")?;
    info!("chain mirror stopped");
    Ok(())
}

async fn watch_artifacts(
    root: &Path,
    workspace: &Workspace,
    gateway: Arc<dyn Gateway>,
    cancel: CancellationToken,
) -> Result<()> {
    let layout = ProjectLayout::detect(root, workspace)
        .ok_or_else(|| anyhow!("no truffle or brownie project found at {}", root.display()))?;
    info!(?layout, "detected project layout");

    let watcher = ArtifactWatcher::start(layout.artifacts_dir())
        .with_context(|| format!("failed to watch {}", layout.artifacts_dir().display()))?;
    let (_guard, events) = watcher.into_parts();

    let resolver = ArtifactResolver::new(layout, AddressCache::new());
    ArtifactPipeline::new(Arc::new(resolver), gateway)
        .run(events, cancel)
        .await;
    Ok(())
}

fn database_path(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.db_path {
        return Ok(path.clone());
    }
    let dirs = ProjectDirs::from("com", "chain-mirror", "chain-mirror")
        .context("no home directory to place the database in")?;
    Ok(dirs.data_dir().join("db"))
}
