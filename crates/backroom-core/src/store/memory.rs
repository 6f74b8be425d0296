use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{validate_collection, DocKey, Document, DocumentStore};
use crate::error::StoreError;

/// In-process store. Each operation is one critical section with no await
/// inside it, so a conditional write either fully lands or not at all.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<DocKey, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &DocKey) -> Result<Option<Document>, StoreError> {
        Ok(self.docs.lock().await.get(key).cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        validate_collection(collection)?;
        let docs = self.docs.lock().await;
        Ok(docs
            .iter()
            .filter(|(key, _)| key.collection() == collection)
            .map(|(key, doc)| (key.id().to_string(), doc.clone()))
            .collect())
    }

    async fn put(&self, key: &DocKey, data: Value) -> Result<Document, StoreError> {
        let mut docs = self.docs.lock().await;
        let doc = match docs.get(key) {
            Some(current) => current.successor(data),
            None => Document::initial(data),
        };
        docs.insert(key.clone(), doc.clone());
        Ok(doc)
    }

    async fn delete(&self, key: &DocKey) -> Result<bool, StoreError> {
        Ok(self.docs.lock().await.remove(key).is_some())
    }

    async fn compare_and_put(
        &self,
        key: &DocKey,
        expected: Option<u64>,
        data: Value,
    ) -> Result<Document, StoreError> {
        let mut docs = self.docs.lock().await;
        let current = docs.get(key);
        if current.map(|doc| doc.version) != expected {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        let doc = match current {
            Some(current) => current.successor(data),
            None => Document::initial(data),
        };
        docs.insert(key.clone(), doc.clone());
        Ok(doc)
    }
}
