//! In-memory Correlation Store used by the integration tests in `tests/`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{CorrelationStore, Result};

#[derive(Default)]
pub struct InMemoryCorrelationStore {
    data: Mutex<HashMap<String, String>>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: simulate an operator manually deleting an entry (e.g.
    /// to exercise partial correlation loss).
    pub fn remove(&self, key: &str) {
        self.data.lock().unwrap().remove(key);
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.data.lock().unwrap().contains_key(key))
    }
}
