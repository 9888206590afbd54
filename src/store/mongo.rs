//! MongoDB-backed Artifact Store.
//!
//! `pending_batches` and `assembled_applications` are plain Mongo
//! collections, serialized via `serde`/`bson` the way a `DispatchJob`
//! entity models its `_id`-keyed documents. The atomic claim in
//! `claim_one_pending_batch` uses `find_one_and_update` with a filter on
//! `sent: false` — Mongo's single-document update is itself atomic, which is
//! all that's needed to guarantee at-most-one concurrent claim per batch
//! across multiple BAC instances.

use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, Database};

use crate::domain::{AssembledApplication, BatchStatus, PendingBatch, UserApplications};

use super::{ArtifactStore, Result, StoreError};

pub struct MongoArtifactStore {
    db: Database,
}

impl MongoArtifactStore {
    pub async fn connect(mongo_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongo_uri)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to connect to mongo: {e}")))?;
        Ok(Self {
            db: client.database(database),
        })
    }

    fn pending_batches(&self) -> Collection<PendingBatch> {
        self.db.collection("pending_batches")
    }

    fn assembled_applications(&self) -> Collection<UserApplications> {
        self.db.collection("assembled_applications")
    }

    fn pdf_resumes(&self) -> Collection<bson::Document> {
        self.db.collection("pdf_resumes")
    }

    fn map_err(e: mongodb::error::Error) -> StoreError {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl ArtifactStore for MongoArtifactStore {
    async fn claim_one_pending_batch(&self) -> Result<Option<PendingBatch>> {
        // `retries_left` is unsigned; decrementing via `$inc` when it's
        // already zero would persist `-1` and fail deserialization on the
        // way back out. Only decrement when there's room, and claim without
        // touching the counter otherwise so Mongo can never go negative.
        let decrement = doc! {
            "$set": { "sent": true },
            "$inc": { "retries_left": -1i32 },
        };
        let claimed = self
            .pending_batches()
            .find_one_and_update(
                doc! { "sent": false, "retries_left": { "$gt": 0i32 } },
                decrement,
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(Self::map_err)?;
        if claimed.is_some() {
            return Ok(claimed);
        }

        let saturate = doc! { "$set": { "sent": true } };
        self.pending_batches()
            .find_one_and_update(doc! { "sent": false }, saturate)
            .return_document(ReturnDocument::After)
            .await
            .map_err(Self::map_err)
    }

    async fn retire_batch(&self, batch_id: &str) -> Result<()> {
        self.pending_batches()
            .delete_one(doc! { "_id": batch_id })
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn restore_batch_if_retryable(&self, batch_id: &str) -> Result<bool> {
        let result = self
            .pending_batches()
            .update_one(
                doc! { "_id": batch_id, "retries_left": { "$gt": 0i32 } },
                doc! { "$set": { "sent": false } },
            )
            .await
            .map_err(Self::map_err)?;
        Ok(result.matched_count > 0)
    }

    async fn mark_batch_failed(&self, batch_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.pending_batches()
            .update_one(
                doc! { "_id": batch_id },
                doc! { "$set": {
                    "status": bson::to_bson(&BatchStatus::Failed).map_err(|e| StoreError::Unavailable(e.to_string()))?,
                    "failed_at": bson::DateTime::from_chrono(at),
                } },
            )
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn insert_pending_batch(&self, batch: PendingBatch) -> Result<()> {
        self.pending_batches()
            .insert_one(batch)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn get_pending_batch(&self, batch_id: &str) -> Result<Option<PendingBatch>> {
        self.pending_batches()
            .find_one(doc! { "_id": batch_id })
            .await
            .map_err(Self::map_err)
    }

    async fn upsert_assembled_application(
        &self,
        user_id: &str,
        correlation_id: &str,
        application: AssembledApplication,
    ) -> Result<()> {
        let field = format!("content.{correlation_id}");
        let value =
            bson::to_bson(&application).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.assembled_applications()
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$setOnInsert": { "user_id": user_id },
                    "$set": { field: value },
                },
            )
            .upsert(true)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserApplications>> {
        self.assembled_applications()
            .find_one(doc! { "user_id": user_id })
            .await
            .map_err(Self::map_err)
    }

    async fn mark_application_sent(
        &self,
        user_id: &str,
        application_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let sent_field = format!("content.{application_id}.sent");
        let ts_field = format!("content.{application_id}.timestamp");
        self.assembled_applications()
            .update_one(
                doc! { "user_id": user_id },
                doc! { "$set": {
                    sent_field: true,
                    ts_field: bson::DateTime::from_chrono(at),
                } },
            )
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn append_application_ids_to_cv(
        &self,
        cv_id: &str,
        correlation_ids: &[String],
    ) -> Result<()> {
        self.pdf_resumes()
            .update_one(
                doc! { "_id": cv_id },
                doc! {
                    "$setOnInsert": { "_id": cv_id },
                    "$push": { "app_ids": { "$each": correlation_ids.to_vec() } },
                },
            )
            .upsert(true)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
