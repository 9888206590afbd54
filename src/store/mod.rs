//! Artifact Store port: durable document store with two logical
//! collections, `pending_batches` and `assembled_applications`.

mod memory;
mod mongo;

pub use memory::InMemoryArtifactStore;
pub use mongo::MongoArtifactStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{AssembledApplication, PendingBatch, UserApplications};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Atomically claim a single unsent batch: `sent=false -> true`,
    /// `retries_left -= 1` (saturating), in one conditional update. Must
    /// guarantee at-most-one concurrent claim per batch across multiple BAC
    /// instances.
    async fn claim_one_pending_batch(&self) -> Result<Option<PendingBatch>>;

    /// Delete a batch from `pending_batches` by id, retiring it on success.
    /// A no-op if already absent (idempotence).
    async fn retire_batch(&self, batch_id: &str) -> Result<()>;

    /// Conditionally restore `sent=false` where `_id=batch_id AND
    /// retries_left > 0`. Returns `true` if the condition matched and the
    /// batch was restored, `false` if retries are exhausted.
    async fn restore_batch_if_retryable(&self, batch_id: &str) -> Result<bool>;

    /// Mark a batch permanently failed.
    async fn mark_batch_failed(&self, batch_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Insert a fresh `PendingBatch` (used by tests and by the external
    /// intake boundary this core does not itself implement).
    async fn insert_pending_batch(&self, batch: PendingBatch) -> Result<()>;

    async fn get_pending_batch(&self, batch_id: &str) -> Result<Option<PendingBatch>>;

    /// Upsert one correlation id's assembled application into the user's
    /// document (`content.<correlation_id>`), creating the document with
    /// `{user_id}` on insert if absent. Per-key, never a whole-document
    /// replacement.
    async fn upsert_assembled_application(
        &self,
        user_id: &str,
        correlation_id: &str,
        application: AssembledApplication,
    ) -> Result<()>;

    async fn get_user_document(&self, user_id: &str) -> Result<Option<UserApplications>>;

    /// Flip `content.<id>.sent` to `true` and stamp `timestamp`. Per-key
    /// update — call only after a successful publish for that id.
    async fn mark_application_sent(
        &self,
        user_id: &str,
        application_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Append freshly minted correlation ids to a CV artifact's `app_ids`
    /// cross-reference list (`pdf_resumes.app_ids`), creating the document
    /// if absent. Auxiliary index only, never source of truth — callers
    /// treat a failure here as best-effort and log rather than abort.
    async fn append_application_ids_to_cv(
        &self,
        cv_id: &str,
        correlation_ids: &[String],
    ) -> Result<()>;
}
