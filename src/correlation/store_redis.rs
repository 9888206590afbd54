//! Redis-backed Correlation Store.
//!
//! A `ConnectionManager` handles transparent reconnection, so callers never
//! manage connection state themselves. Unlike `redis_client.py`, entries are
//! never given a TTL — they are released explicitly on terminal outcomes
//! only.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{CacheError, CorrelationStore, Result};

pub struct RedisCorrelationStore {
    conn: ConnectionManager,
}

impl RedisCorrelationStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Unavailable(format!("redis connection manager: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CorrelationStore for RedisCorrelationStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(key, value)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .del(key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}
