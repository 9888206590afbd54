//! Batch Admission Controller: the only component that may read a batch
//! out of `pending_batches` and hand it to a publisher. Thin on purpose —
//! the hard part (at-most-one-claim guarantee) lives in
//! `ArtifactStore::claim_one_pending_batch`'s atomic conditional update, the
//! way `claim_pending_url` wraps a single atomic claim statement rather
//! than re-implementing locking here.

use std::sync::Arc;

use tracing::instrument;

use crate::domain::PendingBatch;
use crate::store::ArtifactStore;

pub struct BatchAdmissionController {
    store: Arc<dyn ArtifactStore>,
}

impl BatchAdmissionController {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Claim at most one pending batch. Safe to call concurrently from
    /// multiple BAC instances across separate processes: the underlying
    /// store performs the claim as a single conditional update.
    #[instrument(skip(self))]
    pub async fn claim_one(&self) -> crate::store::Result<Option<PendingBatch>> {
        self.store.claim_one_pending_batch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PendingBatch;
    use crate::store::InMemoryArtifactStore;

    fn batch(id: &str) -> PendingBatch {
        PendingBatch {
            batch_id: id.into(),
            user_id: "u1".into(),
            jobs: vec![],
            cv_id: None,
            style: None,
            sent: false,
            retries_left: 3,
            status: None,
            failed_at: None,
        }
    }

    #[tokio::test]
    async fn claims_exactly_one_unsent_batch() {
        let store = Arc::new(InMemoryArtifactStore::new());
        store.insert_pending_batch(batch("b1")).await.unwrap();
        let bac = BatchAdmissionController::new(store.clone());

        let claimed = bac.claim_one().await.unwrap().unwrap();
        assert_eq!(claimed.batch_id, "b1");
        assert!(claimed.sent);

        assert!(bac.claim_one().await.unwrap().is_none());
    }
}
