//! `PendingBatch`, its retryable state machine, and the per-batch outcome
//! CareerDocs eventually reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::job::Job;

/// One row of `pending_batches`: a unit of CareerDocs work for one user
/// containing one or more jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBatch {
    #[serde(rename = "_id")]
    pub batch_id: String,
    pub user_id: String,
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub cv_id: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub sent: bool,
    pub retries_left: u32,
    #[serde(default)]
    pub status: Option<BatchStatus>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Failed,
}

impl PendingBatch {
    /// BAC claim: `sent=true`, retries budget decremented. A claim on a
    /// batch whose budget is already exhausted still succeeds — the
    /// counter simply saturates at zero rather than underflowing; it's the
    /// Response Consumer's failure path that actually marks the batch
    /// permanently failed.
    pub fn claim(&mut self) {
        self.sent = true;
        self.retries_left = self.retries_left.saturating_sub(1);
    }

    /// Restore to `PENDING` after a retryable failure outcome.
    pub fn restore(&mut self) {
        self.sent = false;
    }

    /// Transition to `PERMANENTLY_FAILED`.
    pub fn mark_failed(&mut self, at: DateTime<Utc>) {
        self.status = Some(BatchStatus::Failed);
        self.failed_at = Some(at);
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.status == Some(BatchStatus::Failed)
    }
}

/// Artifacts CareerDocs produced for one application within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifacts {
    #[serde(default, deserialize_with = "deserialize_leniently")]
    pub resume_optimized: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_leniently")]
    pub cover_letter: serde_json::Value,
}

/// CareerDocs is an external system this core does not control; it has been
/// observed to double-encode a field as a JSON string containing JSON.
/// Unwrap that recursively rather than failing the whole outcome on it.
fn deserialize_leniently<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut value = serde_json::Value::deserialize(deserializer)?;
    while let serde_json::Value::String(s) = &value {
        match serde_json::from_str(s) {
            Ok(parsed) => value = parsed,
            Err(_) => break,
        }
    }
    Ok(value)
}

/// Produced by CareerDocs, consumed once by the Response Consumer off
/// `career_docs_response_queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub user_id: String,
    /// Wire field is `mongo_id`, matching the source system's naming;
    /// this is the originating batch's `_id`.
    #[serde(rename = "mongo_id")]
    pub batch_id: String,
    #[serde(default)]
    pub applications: HashMap<String, GeneratedArtifacts>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_decrements_and_never_underflows() {
        let mut b = sample_batch(0);
        b.claim();
        assert_eq!(b.retries_left, 0);
        assert!(b.sent);
    }

    #[test]
    fn claim_decrements_normally() {
        let mut b = sample_batch(3);
        b.claim();
        assert_eq!(b.retries_left, 2);
    }

    #[test]
    fn generated_artifacts_unwraps_double_encoded_json() {
        let raw = serde_json::json!({
            "resume_optimized": "{\"text\": \"resume\"}",
            "cover_letter": {"text": "cover"},
        });
        let artifacts: GeneratedArtifacts = serde_json::from_value(raw).unwrap();
        assert_eq!(artifacts.resume_optimized, serde_json::json!({"text": "resume"}));
        assert_eq!(artifacts.cover_letter, serde_json::json!({"text": "cover"}));
    }

    fn sample_batch(retries_left: u32) -> PendingBatch {
        PendingBatch {
            batch_id: "B1".into(),
            user_id: "42".into(),
            jobs: vec![],
            cv_id: None,
            style: None,
            sent: false,
            retries_left,
            status: None,
            failed_at: None,
        }
    }
}
