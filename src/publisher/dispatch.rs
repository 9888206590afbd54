//! Dispatch Publisher: fans a user's assembled applications out to
//! `providers_queue` and/or `skyvern_queue` by portal, mirroring
//! `appliers_config.py`'s `process_for_providers` / `process_for_skyvern`
//! filters — except here the split happens once, up front, rather than
//! per-applier-microservice re-filtering of the same payload.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};

use crate::bus::MessageBus;
use crate::domain::{ApplierTarget, AssembledApplication};
use crate::error::{OrchestratorError, Result};
use crate::store::ArtifactStore;

pub struct DispatchPublisher {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn ArtifactStore>,
    providers_queue: String,
    skyvern_queue: String,
    providers_enabled: bool,
    skyvern_enabled: bool,
}

impl DispatchPublisher {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn ArtifactStore>,
        providers_queue: impl Into<String>,
        skyvern_queue: impl Into<String>,
        providers_enabled: bool,
        skyvern_enabled: bool,
    ) -> Self {
        Self {
            bus,
            store,
            providers_queue: providers_queue.into(),
            skyvern_queue: skyvern_queue.into(),
            providers_enabled,
            skyvern_enabled,
        }
    }

    /// Submit every unsent application for `user_id`.
    #[instrument(skip(self))]
    pub async fn submit_all(&self, user_id: &str) -> Result<usize> {
        let document = self
            .store
            .get_user_document(user_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(user_id.to_string()))?;

        let pending: Vec<(String, AssembledApplication)> = document
            .content
            .into_iter()
            .filter(|(_, app)| !app.sent)
            .collect();

        self.dispatch(user_id, pending).await
    }

    /// Submit only the requested, still-unsent application ids.
    #[instrument(skip(self, application_ids))]
    pub async fn submit_selected(&self, user_id: &str, application_ids: &[String]) -> Result<usize> {
        let document = self
            .store
            .get_user_document(user_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(user_id.to_string()))?;

        let pending: Vec<(String, AssembledApplication)> = application_ids
            .iter()
            .filter_map(|id| {
                document
                    .content
                    .get(id)
                    .filter(|app| !app.sent)
                    .map(|app| (id.clone(), app.clone()))
            })
            .collect();

        if pending.is_empty() {
            return Err(OrchestratorError::NotFound(format!(
                "none of the requested application ids for user '{user_id}' were found or unsent"
            )));
        }

        self.dispatch(user_id, pending).await
    }

    /// One applier microservice message per application — never a batch of
    /// several — so a slow applier on one application can't hold up the
    /// others behind it in the same queue.
    async fn dispatch(
        &self,
        user_id: &str,
        pending: Vec<(String, AssembledApplication)>,
    ) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }

        let mut dispatched_ids = Vec::new();
        let mut providers_sent = 0usize;
        let mut providers_dropped = 0usize;
        let mut skyvern_sent = 0usize;
        let mut skyvern_dropped = 0usize;

        for (id, app) in pending {
            let (queue, enabled, target) = match app.job.portal.routes_to() {
                ApplierTarget::Providers => (&self.providers_queue, self.providers_enabled, "providers"),
                ApplierTarget::Skyvern => (&self.skyvern_queue, self.skyvern_enabled, "skyvern"),
            };

            if !enabled {
                match target {
                    "providers" => providers_dropped += 1,
                    _ => skyvern_dropped += 1,
                }
                continue;
            }

            let mut content = HashMap::with_capacity(1);
            content.insert(id.clone(), app);
            let message = json!({ "user_id": user_id, "content": content });
            self.bus.publish(queue, message, false).await?;

            match target {
                "providers" => providers_sent += 1,
                _ => skyvern_sent += 1,
            }
            dispatched_ids.push(id);
        }

        if providers_sent > 0 {
            info!(event_type = "APPLICATIONS_DISPATCHED", target = "providers", user_id, count = providers_sent);
        }
        if providers_dropped > 0 {
            warn!(event_type = "ROUTE_DISABLED", target = "providers", user_id, count = providers_dropped, "dropping content for disabled route");
        }
        if skyvern_sent > 0 {
            info!(event_type = "APPLICATIONS_DISPATCHED", target = "skyvern", user_id, count = skyvern_sent);
        }
        if skyvern_dropped > 0 {
            warn!(event_type = "ROUTE_DISABLED", target = "skyvern", user_id, count = skyvern_dropped, "dropping content for disabled route");
        }

        let now = chrono::Utc::now();
        for id in &dispatched_ids {
            self.store.mark_application_sent(user_id, id, now).await?;
        }

        info!(event_type = "ALL_APPLICATIONS_SUBMITTED", user_id, count = dispatched_ids.len());
        Ok(dispatched_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryMessageBus;
    use crate::domain::{AssembledApplication, JobSnapshot, Portal};
    use crate::store::InMemoryArtifactStore;
    use serde_json::{json, Map};

    fn app(portal: &str) -> AssembledApplication {
        AssembledApplication::assemble(
            "corr-1".into(),
            JobSnapshot {
                job_id: Some("j1".into()),
                portal: Portal::new(portal),
                title: "SRE".into(),
                description: "d".into(),
                apply_link: "https://example.test".into(),
                company_name: "Acme".into(),
                location: "Remote".into(),
                extra: Map::new(),
            },
            json!({}),
            json!({}),
            None,
            false,
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn submit_all_routes_by_portal() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        store
            .upsert_assembled_application("u1", "workday-app", app("workday"))
            .await
            .unwrap();
        store
            .upsert_assembled_application("u1", "custom-app", app("custom-ats"))
            .await
            .unwrap();

        let publisher = DispatchPublisher::new(
            bus.clone(),
            store.clone(),
            "providers_queue",
            "skyvern_queue",
            true,
            true,
        );

        let submitted = publisher.submit_all("u1").await.unwrap();
        assert_eq!(submitted, 2);
        assert_eq!(bus.depth("providers_queue"), 1);
        assert_eq!(bus.depth("skyvern_queue"), 1);

        let doc = store.get_user_document("u1").await.unwrap().unwrap();
        assert!(doc.content.values().all(|a| a.sent));
    }

    #[tokio::test]
    async fn each_application_is_published_as_its_own_message() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        store
            .upsert_assembled_application("u1", "workday-app-1", app("workday"))
            .await
            .unwrap();
        store
            .upsert_assembled_application("u1", "workday-app-2", app("workday"))
            .await
            .unwrap();

        let publisher = DispatchPublisher::new(
            bus.clone(),
            store.clone(),
            "providers_queue",
            "skyvern_queue",
            true,
            true,
        );

        let submitted = publisher.submit_all("u1").await.unwrap();
        assert_eq!(submitted, 2);
        assert_eq!(bus.depth("providers_queue"), 2);

        let first = bus.peek_front("providers_queue").unwrap();
        let content = first.get("content").unwrap().as_object().unwrap();
        assert_eq!(content.len(), 1, "each message carries exactly one application");
    }

    #[tokio::test]
    async fn disabled_route_drops_its_content_but_still_dispatches_the_rest() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        store
            .upsert_assembled_application("u1", "workday-app", app("workday"))
            .await
            .unwrap();
        store
            .upsert_assembled_application("u1", "custom-app", app("custom-ats"))
            .await
            .unwrap();

        let publisher = DispatchPublisher::new(
            bus.clone(),
            store.clone(),
            "providers_queue",
            "skyvern_queue",
            true,
            false,
        );

        let submitted = publisher.submit_all("u1").await.unwrap();
        assert_eq!(submitted, 1);
        assert_eq!(bus.depth("providers_queue"), 1);
        assert_eq!(bus.depth("skyvern_queue"), 0);

        let doc = store.get_user_document("u1").await.unwrap().unwrap();
        assert!(doc.content.get("workday-app").unwrap().sent);
        assert!(!doc.content.get("custom-app").unwrap().sent);
    }
}
