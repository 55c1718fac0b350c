//! Document persistence: a primary store backed by a fallback store.
//!
//! Records are opaque JSON documents addressed by `(collection, id)`.
//! `TieredStore` applies the precedence rule:
//!
//! - ids starting with [`LOCAL_ID_PREFIX`] only ever live in the fallback tier;
//! - writes go to the primary and land in the fallback only when the primary fails,
//!   so a fallback copy of any other id is a write the primary has not seen yet;
//! - reads prefer such a pending copy and push it back to the primary, otherwise
//!   they serve the primary and fall through to the fallback on a miss or an error;
//! - lists return the primary's documents with pending copies swapped in, plus
//!   `local-` documents, or the fallback's alone when the primary is unreachable.
//!
//! Across both tiers the last write wins.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use self::redis::RedisDocumentStore;

/// Marks records that were created while the primary store was unreachable.
pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Inserts or replaces the document.
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Every document in the collection, most recently written first.
    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError>;
}

/// Which tier accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTier {
    Primary,
    Fallback,
}

#[derive(Clone)]
pub struct TieredStore {
    primary: Arc<dyn DocumentStore>,
    fallback: Arc<dyn DocumentStore>,
}

impl TieredStore {
    pub fn new(primary: Arc<dyn DocumentStore>, fallback: Arc<dyn DocumentStore>) -> Self {
        Self { primary, fallback }
    }

    pub fn is_local_id(id: &str) -> bool {
        id.starts_with(LOCAL_ID_PREFIX)
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        if Self::is_local_id(id) {
            return self.fallback.get(collection, id).await;
        }

        match self.primary.get(collection, id).await {
            Ok(doc) => match self.fallback.get(collection, id).await {
                Ok(Some(pending)) => {
                    self.resync(collection, id, &pending).await;
                    Ok(Some(pending))
                }
                Ok(None) => Ok(doc),
                Err(e) => {
                    warn!(
                        "Fallback store '{}' failed reading {collection}/{id}: {e}",
                        self.fallback.name()
                    );
                    Ok(doc)
                }
            },
            Err(primary_err) => {
                warn!(
                    "Primary store '{}' failed reading {collection}/{id}, trying fallback: {primary_err}",
                    self.primary.name()
                );
                self.fallback
                    .get(collection, id)
                    .await
                    .map_err(|_| primary_err)
            }
        }
    }

    /// Copies a write made during a primary outage back to the primary and
    /// drops the fallback copy. On failure the copy stays pending.
    async fn resync(&self, collection: &str, id: &str, doc: &Value) {
        match self.primary.put(collection, id, doc).await {
            Ok(()) => {
                info!("Re-synced {collection}/{id} from fallback store to primary");
                self.clear_pending(collection, id).await;
            }
            Err(e) => warn!("Could not re-sync {collection}/{id} to primary: {e}"),
        }
    }

    async fn clear_pending(&self, collection: &str, id: &str) {
        if let Err(e) = self.fallback.delete(collection, id).await {
            warn!(
                "Fallback store '{}' failed dropping {collection}/{id}: {e}",
                self.fallback.name()
            );
        }
    }

    pub async fn put(
        &self,
        collection: &str,
        id: &str,
        doc: &Value,
    ) -> Result<StoreTier, StoreError> {
        if Self::is_local_id(id) {
            self.fallback.put(collection, id, doc).await?;
            return Ok(StoreTier::Fallback);
        }

        match self.primary.put(collection, id, doc).await {
            Ok(()) => {
                self.clear_pending(collection, id).await;
                Ok(StoreTier::Primary)
            }
            Err(primary_err) => {
                warn!(
                    "Primary store '{}' failed writing {collection}/{id}, writing to fallback: {primary_err}",
                    self.primary.name()
                );
                self.fallback
                    .put(collection, id, doc)
                    .await
                    .map_err(|_| primary_err)?;
                Ok(StoreTier::Fallback)
            }
        }
    }

    /// Stores a new record under a freshly minted id and returns that id.
    ///
    /// `build` receives the id so it can be embedded in the document. When the
    /// primary write fails the record is rebuilt under a `local-` id and written
    /// to the fallback tier instead.
    pub async fn insert_new<F>(&self, collection: &str, build: F) -> Result<String, StoreError>
    where
        F: Fn(&str) -> Result<Value, StoreError>,
    {
        let id = Uuid::new_v4().to_string();
        let doc = build(&id)?;
        match self.primary.put(collection, &id, &doc).await {
            Ok(()) => Ok(id),
            Err(primary_err) => {
                let local_id = format!("{LOCAL_ID_PREFIX}{id}");
                warn!(
                    "Primary store '{}' rejected new {collection} record, keeping it locally as {local_id}: {primary_err}",
                    self.primary.name()
                );
                let doc = build(&local_id)?;
                self.fallback
                    .put(collection, &local_id, &doc)
                    .await
                    .map_err(|_| primary_err)?;
                Ok(local_id)
            }
        }
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        match self.primary.list(collection).await {
            Ok(mut docs) => {
                match self.fallback.list(collection).await {
                    Ok(held) => {
                        for doc in held {
                            let Some(id) = doc_id(&doc).map(str::to_string) else {
                                continue;
                            };
                            if Self::is_local_id(&id) {
                                docs.push(doc);
                                continue;
                            }
                            match docs.iter_mut().find(|d| doc_id(d) == Some(id.as_str())) {
                                Some(stale) => *stale = doc,
                                None => docs.push(doc),
                            }
                        }
                    }
                    Err(e) => warn!(
                        "Fallback store '{}' failed listing {collection}: {e}",
                        self.fallback.name()
                    ),
                }
                Ok(docs)
            }
            Err(primary_err) => {
                warn!(
                    "Primary store '{}' failed listing {collection}, serving fallback: {primary_err}",
                    self.primary.name()
                );
                self.fallback.list(collection).await.map_err(|_| primary_err)
            }
        }
    }
}

fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// A primary that is always down.
    pub struct UnreachableStore;

    #[async_trait]
    impl DocumentStore for UnreachableStore {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn get(&self, _: &str, _: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn put(&self, _: &str, _: &str, _: &Value) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn list(&self, _: &str) -> Result<Vec<Value>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    /// An in-memory primary that can be taken down and brought back.
    #[derive(Default)]
    pub struct SwitchableStore {
        inner: MemoryDocumentStore,
        down: std::sync::atomic::AtomicBool,
    }

    impl SwitchableStore {
        pub fn set_down(&self, down: bool) {
            self.down.store(down, std::sync::atomic::Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.down.load(std::sync::atomic::Ordering::SeqCst) {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DocumentStore for SwitchableStore {
        fn name(&self) -> &'static str {
            "switchable"
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
            self.check()?;
            self.inner.get(collection, id).await
        }

        async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
            self.check()?;
            self.inner.put(collection, id, doc).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.check()?;
            self.inner.delete(collection, id).await
        }

        async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
            self.check()?;
            self.inner.list(collection).await
        }
    }

    pub fn switchable_tiers() -> (TieredStore, Arc<SwitchableStore>, Arc<MemoryDocumentStore>) {
        let primary = Arc::new(SwitchableStore::default());
        let fallback = Arc::new(MemoryDocumentStore::new());
        (
            TieredStore::new(primary.clone(), fallback.clone()),
            primary,
            fallback,
        )
    }

    pub fn memory_tiers() -> (TieredStore, Arc<MemoryDocumentStore>, Arc<MemoryDocumentStore>) {
        let primary = Arc::new(MemoryDocumentStore::new());
        let fallback = Arc::new(MemoryDocumentStore::new());
        (
            TieredStore::new(primary.clone(), fallback.clone()),
            primary,
            fallback,
        )
    }

    pub fn degraded_tiers() -> (TieredStore, Arc<MemoryDocumentStore>) {
        let fallback = Arc::new(MemoryDocumentStore::new());
        (
            TieredStore::new(Arc::new(UnreachableStore), fallback.clone()),
            fallback,
        )
    }
}
