use crate::{
    Gateway,
    StoreError,
    collection::{
        Collection,
        Direction,
        Document,
        UpsertOptions,
        apply_upsert,
        sort_documents,
    },
};
use async_trait::async_trait;
use serde_json::Value;
use sled::{
    Config as DbConfig,
    Db,
    Tree,
};
use std::path::Path;
use tracing::{
    debug,
    info,
};

/// Leaf fanout for sled.
pub const LEAF_FANOUT: usize = 1024;

/// Durable gateway backed by sled.
///
/// Each workspace partition owns one tree per collection plus one blob tree,
/// named `<partition>:<collection>` and `<partition>:blobs`.
#[derive(Clone)]
pub struct SledGateway {
    db: Db<LEAF_FANOUT>,
    blocks: Tree<LEAF_FANOUT>,
    transactions: Tree<LEAF_FANOUT>,
    contracts: Tree<LEAF_FANOUT>,
    blobs: Tree<LEAF_FANOUT>,
}

impl SledGateway {
    /// Open (or create) the database at `path` and select `partition`.
    pub fn open(path: impl AsRef<Path>, partition: &str) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db: Db<LEAF_FANOUT> = DbConfig::new().path(path).open()?;
        info!(path = %path.display(), partition, "Opened database");
        Self::with_db(db, partition)
    }

    /// Select `partition` within an already opened database.
    pub fn with_db(db: Db<LEAF_FANOUT>, partition: &str) -> Result<Self, StoreError> {
        let tree = |name: &str| db.open_tree(format!("{partition}:{name}"));
        Ok(Self {
            blocks: tree(Collection::Blocks.as_str())?,
            transactions: tree(Collection::Transactions.as_str())?,
            contracts: tree(Collection::Contracts.as_str())?,
            blobs: tree("blobs")?,
            db,
        })
    }

    /// Force pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, collection: Collection) -> &Tree<LEAF_FANOUT> {
        match collection {
            Collection::Blocks => &self.blocks,
            Collection::Transactions => &self.transactions,
            Collection::Contracts => &self.contracts,
        }
    }
}

fn decode_document(key: &[u8], bytes: &[u8]) -> Result<Document, StoreError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(document) => Ok(document),
        _ => {
            Err(StoreError::NotAnObject {
                key: String::from_utf8_lossy(key).into_owned(),
            })
        }
    }
}

#[async_trait]
impl Gateway for SledGateway {
    async fn upsert(
        &self,
        collection: Collection,
        key: &str,
        record: Document,
        options: UpsertOptions,
    ) -> Result<(), StoreError> {
        let tree = self.tree(collection);
        if !options.merge {
            tree.insert(key, serde_json::to_vec(&apply_upsert(None, record, options))?)?;
            debug!(%collection, key, "record written");
            return Ok(());
        }

        // Merge against the exact bytes we read so a concurrent writer forces a retry.
        loop {
            let current = tree.get(key)?;
            let existing = current
                .as_deref()
                .map(|bytes| decode_document(key.as_bytes(), bytes))
                .transpose()?;
            let merged = serde_json::to_vec(&apply_upsert(existing, record.clone(), options))?;

            match tree.compare_and_swap(key, current.as_deref(), Some(merged))? {
                Ok(_) => break,
                Err(_) => {
                    debug!(%collection, key, "Merge compare and swap failed, retrying");
                }
            }
        }
        debug!(%collection, key, "record merged");
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Document>, StoreError> {
        self.tree(collection)
            .get(key)?
            .map(|bytes| decode_document(key.as_bytes(), &bytes))
            .transpose()
    }

    async fn list(
        &self,
        collection: Collection,
        order_by: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError> {
        let mut documents = self
            .tree(collection)
            .iter()
            .map(|entry| {
                let (key, bytes) = entry?;
                decode_document(&key, &bytes)
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        sort_documents(&mut documents, order_by, direction);
        Ok(documents)
    }

    async fn put_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.blobs.insert(key, bytes)?;
        debug!(key, "blob written");
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.get(key)?.map(|bytes| bytes.to_vec()))
    }
}
