//! Correlation Store port and the Correlation Registry built on top of it.

mod memory;
mod registry;
mod store_redis;

pub use memory::InMemoryCorrelationStore;
pub use registry::CorrelationRegistry;
pub use store_redis::RedisCorrelationStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("correlation store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Ephemeral key/value store mapping a correlation id to the immutable job
/// metadata required to reconstruct the response.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn exists(&self, key: &str) -> Result<bool>;
}
