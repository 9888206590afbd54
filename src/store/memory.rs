//! In-memory Artifact Store used by the integration tests in `tests/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::domain::{AssembledApplication, PendingBatch, UserApplications};

use super::{ArtifactStore, Result};

#[derive(Default)]
pub struct InMemoryArtifactStore {
    batches: Mutex<BTreeMap<String, PendingBatch>>,
    applications: Mutex<BTreeMap<String, UserApplications>>,
    pdf_resumes: Mutex<BTreeMap<String, Vec<String>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn cv_app_ids(&self, cv_id: &str) -> Vec<String> {
        self.pdf_resumes
            .lock()
            .unwrap()
            .get(cv_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn claim_one_pending_batch(&self) -> Result<Option<PendingBatch>> {
        let mut batches = self.batches.lock().unwrap();
        let claimable_id = batches
            .iter()
            .find(|(_, b)| !b.sent)
            .map(|(id, _)| id.clone());
        let Some(id) = claimable_id else {
            return Ok(None);
        };
        let batch = batches.get_mut(&id).unwrap();
        batch.claim();
        Ok(Some(batch.clone()))
    }

    async fn retire_batch(&self, batch_id: &str) -> Result<()> {
        self.batches.lock().unwrap().remove(batch_id);
        Ok(())
    }

    async fn restore_batch_if_retryable(&self, batch_id: &str) -> Result<bool> {
        let mut batches = self.batches.lock().unwrap();
        match batches.get_mut(batch_id) {
            Some(batch) if batch.retries_left > 0 => {
                batch.restore();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_batch_failed(&self, batch_id: &str, at: DateTime<Utc>) -> Result<()> {
        if let Some(batch) = self.batches.lock().unwrap().get_mut(batch_id) {
            batch.mark_failed(at);
        }
        Ok(())
    }

    async fn insert_pending_batch(&self, batch: PendingBatch) -> Result<()> {
        self.batches
            .lock()
            .unwrap()
            .insert(batch.batch_id.clone(), batch);
        Ok(())
    }

    async fn get_pending_batch(&self, batch_id: &str) -> Result<Option<PendingBatch>> {
        Ok(self.batches.lock().unwrap().get(batch_id).cloned())
    }

    async fn upsert_assembled_application(
        &self,
        user_id: &str,
        correlation_id: &str,
        mut application: AssembledApplication,
    ) -> Result<()> {
        application.id = correlation_id.to_string();
        let mut applications = self.applications.lock().unwrap();
        let doc = applications
            .entry(user_id.to_string())
            .or_insert_with(|| UserApplications {
                user_id: user_id.to_string(),
                content: Default::default(),
            });
        doc.content.insert(correlation_id.to_string(), application);
        Ok(())
    }

    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserApplications>> {
        Ok(self.applications.lock().unwrap().get(user_id).cloned())
    }

    async fn mark_application_sent(
        &self,
        user_id: &str,
        application_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(doc) = self.applications.lock().unwrap().get_mut(user_id) {
            if let Some(app) = doc.content.get_mut(application_id) {
                app.mark_sent(at);
            }
        }
        Ok(())
    }

    async fn append_application_ids_to_cv(
        &self,
        cv_id: &str,
        correlation_ids: &[String],
    ) -> Result<()> {
        self.pdf_resumes
            .lock()
            .unwrap()
            .entry(cv_id.to_string())
            .or_default()
            .extend(correlation_ids.iter().cloned());
        Ok(())
    }
}
