use async_trait::async_trait;
use ::redis::AsyncCommands;
use serde_json::Value;

use super::{DocumentStore, StoreError};

const KEY_PREFIX: &str = "counsel";

/// Fallback tier backed by Redis: one string key per document plus an id set per collection.
#[derive(Clone)]
pub struct RedisDocumentStore {
    client: ::redis::Client,
}

impl RedisDocumentStore {
    pub fn new(client: ::redis::Client) -> Self {
        Self { client }
    }

    fn doc_key(collection: &str, id: &str) -> String {
        format!("{KEY_PREFIX}:{collection}:{id}")
    }

    fn index_key(collection: &str) -> String {
        format!("{KEY_PREFIX}:{collection}:ids")
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(Self::doc_key(collection, id)).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), StoreError> {
        let body = serde_json::to_string(doc)?;
        let score = chrono::Utc::now().timestamp_millis();
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        ::redis::pipe()
            .atomic()
            .set(Self::doc_key(collection, id), body)
            .ignore()
            .zadd(Self::index_key(collection), id, score)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        ::redis::pipe()
            .atomic()
            .del(Self::doc_key(collection, id))
            .ignore()
            .zrem(Self::index_key(collection), id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ids: Vec<String> = conn.zrevrange(Self::index_key(collection), 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| Self::doc_key(collection, id)).collect();
        let raws: Vec<Option<String>> = ::redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;
        raws.into_iter()
            .flatten()
            .map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(RedisDocumentStore::doc_key("sessions", "abc"), "counsel:sessions:abc");
        assert_eq!(RedisDocumentStore::index_key("sessions"), "counsel:sessions:ids");
    }
}
