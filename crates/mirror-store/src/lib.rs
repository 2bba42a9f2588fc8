//! Collection-oriented persistence for mirrored chain data.
//!
//! # Overview
//!
//! The sync engine only needs a narrow view of its backing store: upsert a
//! record into a named collection, read it back by key, list a collection
//! ordered by one field, and keep opaque blobs under string keys. That view is
//! the [`Gateway`] trait.
//!
//! # Data Model
//!
//! Every workspace gets its own partition. Within a partition:
//! - `blocks` - one document per block, keyed by the decimal block number
//! - `transactions` - one document per transaction, keyed by the transaction hash
//! - `contracts` - one document per contract, keyed by the contract address
//! - blobs - opaque bytes keyed by `<address>/artifact` and `<address>/dependencies`
//!
//! # Backends
//!
//! - [`SledGateway`] - durable store on disk, one tree per collection
//! - [`MemoryGateway`] - process-local maps, used by tests and dry runs

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod collection;
mod error;
mod memory;
mod sled_gateway;

pub use collection::{
    Collection,
    Direction,
    Document,
    UpsertOptions,
};
pub use error::StoreError;
pub use memory::MemoryGateway;
pub use sled_gateway::SledGateway;

use async_trait::async_trait;

/// Key of the serialized artifact bundle for a contract.
pub fn artifact_blob_key(address: &str) -> String {
    format!("{address}/artifact")
}

/// Key of the serialized dependency map for a contract.
pub fn dependencies_blob_key(address: &str) -> String {
    format!("{address}/dependencies")
}

/// Persistence and query interface consumed by the sync engine.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Insert or update a record. With `merge`, fields absent from `record`
    /// keep their stored value; without it the stored record is replaced.
    async fn upsert(
        &self,
        collection: Collection,
        key: &str,
        record: Document,
        options: UpsertOptions,
    ) -> Result<(), StoreError>;

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Document>, StoreError>;

    /// Every record of `collection`, ordered by `order_by`.
    async fn list(
        &self,
        collection: Collection,
        order_by: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError>;

    async fn put_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}
