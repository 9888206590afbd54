//! Response Consumer & Assembler: consumes `career_docs_response_queue`,
//! reconstructs each application from its correlation snapshot, upserts it
//! into the user's document, and retires or restores the originating batch
//! depending on outcome. The per-message algorithm follows
//! `career_docs_consumer.py`'s `process_message` /
//! `_retrieve_content_from_redis` / `_update_career_docs_responses`, adapted
//! to this core's pull-based `MessageBus::poll` rather than a push callback
//! (`base_consumer.py::_message_handler`).

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::bus::MessageBus;
use crate::correlation::CorrelationRegistry;
use crate::domain::{AssembledApplication, BatchOutcome};
use crate::error::{OrchestratorError, Result};
use crate::store::ArtifactStore;

pub struct ResponseConsumer {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn ArtifactStore>,
    correlation: Arc<CorrelationRegistry>,
    queue: String,
}

impl ResponseConsumer {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn ArtifactStore>,
        correlation: Arc<CorrelationRegistry>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            store,
            correlation,
            queue: queue.into(),
        }
    }

    /// Poll for and process a single outcome. Returns `true` if a message
    /// was available (regardless of whether processing succeeded), `false`
    /// if the queue was empty — the caller (the Refill Loop's Response
    /// Consumer event trigger) uses this to decide whether a refill pass is
    /// warranted.
    #[instrument(skip(self))]
    pub async fn process_one(&self) -> Result<bool> {
        let Some(delivery) = self.bus.poll(&self.queue).await? else {
            return Ok(false);
        };

        let outcome: BatchOutcome = match serde_json::from_value(delivery.body.clone()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(event_type = "RESPONSE_SCHEMA_INVALID", error = %e, "dropping unparseable outcome");
                delivery.ack_and_drop().await?;
                return Ok(true);
            }
        };

        match self.handle_outcome(&outcome).await {
            Ok(()) => {
                delivery.ack().await?;
            }
            Err(OrchestratorError::SchemaInvalid(reason)) => {
                warn!(event_type = "RESPONSE_SCHEMA_INVALID", batch_id = %outcome.batch_id, reason, "dropping invalid outcome");
                delivery.ack_and_drop().await?;
            }
            Err(e) if e.is_transient() => {
                warn!(event_type = "RESPONSE_PROCESSING_TRANSIENT_FAILURE", batch_id = %outcome.batch_id, error = %e, "requeueing outcome");
                delivery.nack_requeue().await?;
            }
            Err(e) => return Err(e),
        }

        Ok(true)
    }

    async fn handle_outcome(&self, outcome: &BatchOutcome) -> Result<()> {
        if outcome.success {
            self.assemble_and_store(outcome).await?;
            self.store.retire_batch(&outcome.batch_id).await?;
            info!(event_type = "BATCH_OUTCOME_SUCCEEDED", batch_id = %outcome.batch_id, user_id = %outcome.user_id);
        } else {
            let restored = self
                .store
                .restore_batch_if_retryable(&outcome.batch_id)
                .await?;
            if restored {
                info!(event_type = "BATCH_OUTCOME_RESTORED", batch_id = %outcome.batch_id);
            } else {
                self.store
                    .mark_batch_failed(&outcome.batch_id, Utc::now())
                    .await?;
                let unrecoverable = OrchestratorError::BatchUnrecoverable {
                    batch_id: outcome.batch_id.clone(),
                };
                warn!(event_type = "BATCH_PERMANENTLY_FAILED", error = %unrecoverable);
            }
        }
        Ok(())
    }

    /// For each correlation id in the outcome, read back the immutable job
    /// snapshot, compose the `AssembledApplication`, and upsert it — then
    /// release the correlation id only once the upsert has durably
    /// succeeded, so a redelivered outcome can still resolve the snapshot.
    /// A correlation id that's gone missing (e.g. it already expired) or
    /// whose store is unreachable at lookup time is logged and skipped
    /// rather than aborting the whole outcome — a lookup failure here is a
    /// permanent loss for that one application, not a reason to nack and
    /// requeue the entire message, and the rest of the batch's applications
    /// still get written with the batch retiring normally.
    async fn assemble_and_store(&self, outcome: &BatchOutcome) -> Result<()> {
        for (correlation_id, artifacts) in &outcome.applications {
            let snapshot = match self.correlation.lookup(correlation_id).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    let missing = OrchestratorError::CorrelationMissing(correlation_id.clone());
                    warn!(event_type = "CORRELATION_MISSING", batch_id = %outcome.batch_id, error = %missing);
                    continue;
                }
                Err(e) => {
                    warn!(event_type = "CORRELATION_LOOKUP_FAILED", batch_id = %outcome.batch_id, correlation_id, error = %e, "treating as permanent loss for this application");
                    continue;
                }
            };

            let application = AssembledApplication::assemble(
                correlation_id.clone(),
                snapshot,
                artifacts.resume_optimized.clone(),
                artifacts.cover_letter.clone(),
                None,
                false,
                Utc::now(),
            );

            self.store
                .upsert_assembled_application(&outcome.user_id, correlation_id, application)
                .await?;

            self.correlation.release(correlation_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryMessageBus;
    use crate::correlation::{CacheError, CorrelationStore, InMemoryCorrelationStore};
    use crate::domain::{GeneratedArtifacts, Job, Portal};
    use crate::store::InMemoryArtifactStore;
    use serde_json::{json, Map};
    use std::collections::HashMap;

    /// A correlation store that always fails its lookup, standing in for a
    /// Redis outage between mint and response.
    struct UnavailableCorrelationStore;

    #[async_trait::async_trait]
    impl CorrelationStore for UnavailableCorrelationStore {
        async fn get(&self, _key: &str) -> crate::correlation::Result<Option<String>> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> crate::correlation::Result<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> crate::correlation::Result<bool> {
            Ok(false)
        }
        async fn exists(&self, _key: &str) -> crate::correlation::Result<bool> {
            Ok(false)
        }
    }

    fn job() -> Job {
        Job {
            job_id: Some("j1".into()),
            portal: Portal::new("workday"),
            title: "SRE".into(),
            description: "desc".into(),
            apply_link: "https://example.test".into(),
            company_name: "Acme".into(),
            location: "Remote".into(),
            correlation_id: None,
            extra: Map::new(),
        }
    }

    async fn setup() -> (
        Arc<InMemoryMessageBus>,
        Arc<InMemoryArtifactStore>,
        Arc<CorrelationRegistry>,
        String,
    ) {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        let correlation = Arc::new(CorrelationRegistry::new(Arc::new(
            InMemoryCorrelationStore::new(),
        )));
        let correlation_id = correlation.mint(&job().snapshot()).await.unwrap();
        store
            .insert_pending_batch(crate::domain::PendingBatch {
                batch_id: "b1".into(),
                user_id: "u1".into(),
                jobs: vec![job()],
                cv_id: None,
                style: None,
                sent: true,
                retries_left: 3,
                status: None,
                failed_at: None,
            })
            .await
            .unwrap();
        (bus, store, correlation, correlation_id)
    }

    #[tokio::test]
    async fn successful_outcome_assembles_and_retires() {
        let (bus, store, correlation, correlation_id) = setup().await;
        let consumer = ResponseConsumer::new(
            bus.clone(),
            store.clone(),
            correlation.clone(),
            "career_docs_response_queue",
        );

        let mut applications = HashMap::new();
        applications.insert(
            correlation_id.clone(),
            GeneratedArtifacts {
                resume_optimized: json!({"text": "resume"}),
                cover_letter: json!({"text": "cover"}),
            },
        );
        let outcome = json!({
            "success": true,
            "user_id": "u1",
            "mongo_id": "b1",
            "applications": applications,
        });
        bus.publish("career_docs_response_queue", outcome, true)
            .await
            .unwrap();

        let processed = consumer.process_one().await.unwrap();
        assert!(processed);

        assert!(store.get_pending_batch("b1").await.unwrap().is_none());
        let doc = store.get_user_document("u1").await.unwrap().unwrap();
        assert!(doc.content.contains_key(&correlation_id));
        assert!(correlation.lookup(&correlation_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_outcome_restores_when_retries_remain() {
        let (bus, store, correlation, _correlation_id) = setup().await;
        let consumer = ResponseConsumer::new(bus.clone(), store.clone(), correlation, "q");

        let outcome = json!({
            "success": false,
            "user_id": "u1",
            "mongo_id": "b1",
            "applications": {},
        });
        bus.publish("q", outcome, true).await.unwrap();

        consumer.process_one().await.unwrap();

        let batch = store.get_pending_batch("b1").await.unwrap().unwrap();
        assert!(!batch.sent);
        assert!(!batch.is_permanently_failed());
    }

    #[tokio::test]
    async fn failed_outcome_marks_permanently_failed_once_retries_exhausted() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        let correlation = Arc::new(CorrelationRegistry::new(Arc::new(
            InMemoryCorrelationStore::new(),
        )));
        store
            .insert_pending_batch(crate::domain::PendingBatch {
                batch_id: "b2".into(),
                user_id: "u1".into(),
                jobs: vec![job()],
                cv_id: None,
                style: None,
                sent: true,
                retries_left: 0,
                status: None,
                failed_at: None,
            })
            .await
            .unwrap();
        let consumer = ResponseConsumer::new(bus.clone(), store.clone(), correlation, "q");

        let outcome = json!({
            "success": false,
            "user_id": "u1",
            "mongo_id": "b2",
            "applications": {},
        });
        bus.publish("q", outcome, true).await.unwrap();
        consumer.process_one().await.unwrap();

        let batch = store.get_pending_batch("b2").await.unwrap().unwrap();
        assert!(batch.is_permanently_failed());
    }

    #[tokio::test]
    async fn correlation_store_unavailable_at_lookup_skips_that_application_but_still_acks() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        let correlation = Arc::new(CorrelationRegistry::new(Arc::new(
            UnavailableCorrelationStore,
        )));
        store
            .insert_pending_batch(crate::domain::PendingBatch {
                batch_id: "b3".into(),
                user_id: "u1".into(),
                jobs: vec![job()],
                cv_id: None,
                style: None,
                sent: true,
                retries_left: 3,
                status: None,
                failed_at: None,
            })
            .await
            .unwrap();
        let consumer = ResponseConsumer::new(bus.clone(), store.clone(), correlation, "q");

        let mut applications = HashMap::new();
        applications.insert(
            "corr-unreachable".to_string(),
            GeneratedArtifacts {
                resume_optimized: json!({"text": "resume"}),
                cover_letter: json!({"text": "cover"}),
            },
        );
        let outcome = json!({
            "success": true,
            "user_id": "u1",
            "mongo_id": "b3",
            "applications": applications,
        });
        bus.publish("q", outcome, true).await.unwrap();

        let processed = consumer.process_one().await.unwrap();
        assert!(processed);

        // The whole outcome is still acknowledged and the batch retires
        // normally; only the one application with the unreachable
        // correlation lookup is dropped, not requeued.
        assert_eq!(bus.depth("q"), 0);
        assert!(store.get_pending_batch("b3").await.unwrap().is_none());
        match store.get_user_document("u1").await.unwrap() {
            Some(doc) => assert!(!doc.content.contains_key("corr-unreachable")),
            None => {}
        }
    }
}
