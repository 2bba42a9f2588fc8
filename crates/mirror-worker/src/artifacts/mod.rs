//! Contract metadata discovered from local build artifacts.
//!
//! A changed artifact is resolved to its deployed address on the active
//! network. When that address is new for the contract name, the artifact's
//! direct dependencies are read from sibling artifact files and the result is
//! persisted as a contract record plus two address-scoped blobs.

mod cache;
mod layout;
mod resolver;
mod watcher;

pub use cache::AddressCache;
pub use layout::ProjectLayout;
pub use resolver::{
    ArtifactBundle,
    ArtifactResolver,
    ContractUpdate,
};
pub use watcher::{
    ArtifactEvent,
    ArtifactEventKind,
    ArtifactPipeline,
    ArtifactWatcher,
};

use mirror_store::StoreError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed artifact: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Artifact is missing `{0}`")]
    MissingField(&'static str),
    #[error("Invalid deployed address: {0}")]
    InvalidAddress(String),
    #[error("Failed to persist artifact: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to watch artifacts: {0}")]
    Watch(#[from] notify::Error),
}
