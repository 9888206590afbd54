//! Correlation Registry — write-through layer over the Correlation Store.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::JobSnapshot;

use super::{CacheError, CorrelationStore, Result};

/// Bounded number of UUID-v4 generation attempts before giving up on a mint.
/// Collision probability is negligible; this just stops an adversarial or
/// corrupted store from spinning the admission path forever.
const MAX_MINT_ATTEMPTS: u8 = 8;

pub struct CorrelationRegistry {
    store: Arc<dyn CorrelationStore>,
}

impl CorrelationRegistry {
    pub fn new(store: Arc<dyn CorrelationStore>) -> Self {
        Self { store }
    }

    /// Mints a fresh correlation id, verifies it's absent from the store,
    /// and persists the snapshot under that key. Retries id generation on
    /// collision.
    #[instrument(skip(self, snapshot))]
    pub async fn mint(&self, snapshot: &JobSnapshot) -> Result<String> {
        for _ in 0..MAX_MINT_ATTEMPTS {
            let candidate = Uuid::new_v4().to_string();
            if self.store.exists(&candidate).await? {
                continue;
            }
            let payload = serde_json::to_string(snapshot)?;
            self.store.set(&candidate, &payload).await?;
            return Ok(candidate);
        }
        Err(CacheError::Unavailable(
            "exhausted attempts minting a unique correlation id".into(),
        ))
    }

    /// Reads the snapshot back. `Ok(None)` means the id was never minted or
    /// has already been released — an unrecoverable-input condition for the
    /// caller.
    #[instrument(skip(self))]
    pub async fn lookup(&self, correlation_id: &str) -> Result<Option<JobSnapshot>> {
        match self.store.get(correlation_id).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Deletes the entry. Must only be called on terminal outcomes — never
    /// mid-retry, which would risk re-issuing a live id. Tolerates a key
    /// that is already absent, so a duplicate-delivered outcome releasing
    /// twice is a no-op.
    #[instrument(skip(self))]
    pub async fn release(&self, correlation_id: &str) -> Result<()> {
        self.store.delete(correlation_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::InMemoryCorrelationStore;
    use crate::domain::Portal;
    use serde_json::Map;

    fn snapshot() -> JobSnapshot {
        JobSnapshot {
            job_id: Some("J1".into()),
            portal: Portal::new("workday"),
            title: "SRE".into(),
            description: "desc".into(),
            apply_link: "https://example.test/apply".into(),
            company_name: "Acme".into(),
            location: "Remote".into(),
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn mint_then_lookup_round_trips() {
        let store = Arc::new(InMemoryCorrelationStore::new());
        let registry = CorrelationRegistry::new(store);
        let id = registry.mint(&snapshot()).await.unwrap();
        let back = registry.lookup(&id).await.unwrap().unwrap();
        assert_eq!(back.title, "SRE");
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = Arc::new(InMemoryCorrelationStore::new());
        let registry = CorrelationRegistry::new(store);
        let id = registry.mint(&snapshot()).await.unwrap();
        registry.release(&id).await.unwrap();
        // Second release of an already-absent key must not error.
        registry.release(&id).await.unwrap();
        assert!(registry.lookup(&id).await.unwrap().is_none());
    }
}
