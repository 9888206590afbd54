//! CareerDocs Publisher: admits one claimed batch onto `career_docs_queue`,
//! minting a correlation id for each job first so the
//! Response Consumer can later reconstruct the immutable job fields
//! CareerDocs itself doesn't echo back.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::admission::BatchAdmissionController;
use crate::bus::MessageBus;
use crate::correlation::CorrelationRegistry;
use crate::domain::PendingBatch;
use crate::error::Result;
use crate::store::ArtifactStore;

/// Safety cap on claims within a single `refill()` call, independent of
/// `max_inflight`. Guards against a queue-depth check that lags real
/// publishes (e.g. an AMQP management API snapshot) from spinning the loop
/// indefinitely; ordinary operation never gets close to this.
const MAX_CLAIMS_PER_REFILL: u64 = 10_000;

pub struct CareerDocsPublisher {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn ArtifactStore>,
    correlation: Arc<CorrelationRegistry>,
    admission: Arc<BatchAdmissionController>,
    queue: String,
    max_inflight: u64,
}

impl CareerDocsPublisher {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn ArtifactStore>,
        correlation: Arc<CorrelationRegistry>,
        admission: Arc<BatchAdmissionController>,
        queue: impl Into<String>,
        max_inflight: u64,
    ) -> Self {
        Self {
            bus,
            store,
            correlation,
            admission,
            queue: queue.into(),
            max_inflight,
        }
    }

    /// Mint a correlation id for every job in `batch` and publish it as a
    /// single message: `{batch_id, user_id, cv_id, style, jobs: [{...,
    /// correlation_id}]}`.
    #[instrument(skip(self, batch), fields(batch_id = %batch.batch_id))]
    pub async fn publish_batch(&self, mut batch: PendingBatch) -> Result<()> {
        let mut minted_ids = Vec::with_capacity(batch.jobs.len());
        for job in &mut batch.jobs {
            let snapshot = job.snapshot();
            let correlation_id = self.correlation.mint(&snapshot).await?;
            minted_ids.push(correlation_id.clone());
            job.correlation_id = Some(correlation_id);
        }

        if let Some(cv_id) = &batch.cv_id {
            if let Err(e) = self
                .store
                .append_application_ids_to_cv(cv_id, &minted_ids)
                .await
            {
                warn!(event_type = "CV_APP_IDS_APPEND_FAILED", batch_id = %batch.batch_id, cv_id, error = %e, "auxiliary cross-reference only, continuing publish");
            }
        }

        let message = json!({
            "batch_id": batch.batch_id,
            "user_id": batch.user_id,
            "cv_id": batch.cv_id,
            "style": batch.style,
            "jobs": batch.jobs,
        });

        self.bus.publish(&self.queue, message, true).await?;
        info!(event_type = "CAREER_DOCS_BATCH_PUBLISHED", batch_id = %batch.batch_id, "published batch to career_docs");
        Ok(())
    }

    /// Claim and publish batches until `career_docs_queue` reaches
    /// `max_inflight` or there is no more pending work. Each claim failure
    /// short-circuits the refill; the batch stays claimed (the
    /// Response Consumer's failure path is what eventually restores or
    /// fails it).
    #[instrument(skip(self))]
    pub async fn refill(&self) -> Result<u64> {
        let mut published = 0u64;
        while published < MAX_CLAIMS_PER_REFILL {
            let depth = self.bus.queue_depth(&self.queue).await?;
            if depth >= self.max_inflight {
                break;
            }
            match self.admission.claim_one().await? {
                Some(batch) => {
                    self.publish_batch(batch).await?;
                    published += 1;
                }
                None => break,
            }
        }
        info!(event_type = "CAREER_DOCS_QUEUE_REFILLED", published, "refill cycle complete");
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryMessageBus;
    use crate::correlation::InMemoryCorrelationStore;
    use crate::domain::{Job, Portal};
    use crate::store::{ArtifactStore, InMemoryArtifactStore};
    use serde_json::Map;

    fn job(id: &str) -> Job {
        Job {
            job_id: Some(id.into()),
            portal: Portal::new("workday"),
            title: "SRE".into(),
            description: "desc".into(),
            apply_link: "https://example.test/apply".into(),
            company_name: "Acme".into(),
            location: "Remote".into(),
            correlation_id: None,
            extra: Map::new(),
        }
    }

    fn batch(id: &str, jobs: Vec<Job>) -> PendingBatch {
        PendingBatch {
            batch_id: id.into(),
            user_id: "u1".into(),
            jobs,
            cv_id: None,
            style: None,
            sent: false,
            retries_left: 3,
            status: None,
            failed_at: None,
        }
    }

    fn publisher(
        bus: Arc<InMemoryMessageBus>,
        store: Arc<InMemoryArtifactStore>,
    ) -> CareerDocsPublisher {
        let correlation = Arc::new(CorrelationRegistry::new(Arc::new(
            InMemoryCorrelationStore::new(),
        )));
        let admission = Arc::new(BatchAdmissionController::new(store.clone()));
        CareerDocsPublisher::new(bus, store, correlation, admission, "career_docs_queue", 2)
    }

    #[tokio::test]
    async fn publish_batch_mints_a_correlation_id_per_job() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        let publisher = publisher(bus.clone(), store);

        publisher
            .publish_batch(batch("b1", vec![job("j1"), job("j2")]))
            .await
            .unwrap();

        assert_eq!(bus.depth("career_docs_queue"), 1);
    }

    #[tokio::test]
    async fn refill_stops_at_max_inflight() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        for i in 0..5 {
            store
                .insert_pending_batch(batch(&format!("b{i}"), vec![job("j1")]))
                .await
                .unwrap();
        }
        let publisher = publisher(bus.clone(), store);

        let published = publisher.refill().await.unwrap();
        assert_eq!(published, 2);
        assert_eq!(bus.depth("career_docs_queue"), 2);
    }

    #[tokio::test]
    async fn publish_batch_appends_minted_ids_to_the_cv_cross_reference() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        let publisher = publisher(bus.clone(), store.clone());

        let mut b = batch("b1", vec![job("j1"), job("j2")]);
        b.cv_id = Some("cv-1".into());
        publisher.publish_batch(b).await.unwrap();

        assert_eq!(store.cv_app_ids("cv-1").len(), 2);
    }
}
