//! Runtime configuration for the mirror worker.

use crate::chain::ChainError;
use std::{
    path::PathBuf,
    time::Duration,
};
use url::Url;

pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_BACKFILL_CONCURRENCY: usize = 16;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Clone, Debug)]
pub struct Config {
    /// Node endpoint. `ws(s)://` streams heads, `http(s)://` polls for them.
    pub rpc_server: String,
    pub network_id: u64,
    /// Workspace name, also the persistence partition.
    pub workspace: String,
    /// Database directory. Falls back to the platform data dir.
    pub db_path: Option<PathBuf>,
    /// Project whose build artifacts are watched. `None` disables watching.
    pub project_root: Option<PathBuf>,
    pub listen_transactions: bool,
    pub retry_delay: Duration,
    pub backfill_concurrency: usize,
    pub poll_interval: Duration,
}

impl Config {
    pub fn workspace(&self) -> Workspace {
        Workspace {
            name: self.workspace.clone(),
            rpc_server: self.rpc_server.clone(),
            network_id: self.network_id,
        }
    }
}

/// Network and partition selection, resolved once before the engine starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    pub name: String,
    pub rpc_server: String,
    pub network_id: u64,
}

/// How new heads are obtained. Fixed for the lifetime of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Streaming,
    Polling,
}

impl Transport {
    pub fn from_url(url: &Url) -> Result<Self, ChainError> {
        match url.scheme() {
            "ws" | "wss" => Ok(Self::Streaming),
            "http" | "https" => Ok(Self::Polling),
            other => Err(ChainError::UnsupportedEndpoint(other.to_string())),
        }
    }
}
