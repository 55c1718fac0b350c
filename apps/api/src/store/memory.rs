use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{DocumentStore, StoreError};

#[derive(Default)]
struct Inner {
    seq: u64,
    docs: HashMap<(String, String), (u64, Value)>,
}

/// Process-local store. Fallback tier when no Redis is configured, and the test double.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|(_, doc)| doc.clone()))
    }

    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.seq += 1;
        let seq = inner.seq;
        inner
            .docs
            .insert((collection.to_string(), id.to_string()), (seq, doc.clone()));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .docs
            .remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let inner = self.inner.read().await;
        let mut docs: Vec<&(u64, Value)> = inner
            .docs
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|(_, entry)| entry)
            .collect();
        docs.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(docs.into_iter().map(|(_, doc)| doc.clone()).collect())
    }
}
