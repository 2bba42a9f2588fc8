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
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local gateway. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    records: RwLock<HashMap<(Collection, String), Document>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    writes: RwLock<usize>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of record and blob writes accepted so far.
    pub fn write_count(&self) -> usize {
        *self.writes.read()
    }

    /// Number of records stored in `collection`.
    pub fn len(&self, collection: Collection) -> usize {
        self.records
            .read()
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty() && self.blobs.read().is_empty()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn upsert(
        &self,
        collection: Collection,
        key: &str,
        record: Document,
        options: UpsertOptions,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let slot = (collection, key.to_string());
        let existing = records.remove(&slot);
        records.insert(slot, apply_upsert(existing, record, options));
        *self.writes.write() += 1;
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .records
            .read()
            .get(&(collection, key.to_string()))
            .cloned())
    }

    async fn list(
        &self,
        collection: Collection,
        order_by: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError> {
        let mut documents: Vec<Document> = self
            .records
            .read()
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, doc)| doc.clone())
            .collect();
        sort_documents(&mut documents, order_by, direction);
        Ok(documents)
    }

    async fn put_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.blobs.write().insert(key.to_string(), bytes);
        *self.writes.write() += 1;
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.read().get(key).cloned())
    }
}
