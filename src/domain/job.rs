//! `Job` and the immutable `JobSnapshot` minted into the correlation store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::portal::Portal;

/// One job within a `PendingBatch`, as supplied by the upstream intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Option<String>,
    pub portal: Portal,
    pub title: String,
    pub description: String,
    pub apply_link: String,
    pub company_name: String,
    pub location: String,

    /// Assigned by the CareerDocs Publisher at admission. Absent until minted.
    #[serde(default)]
    pub correlation_id: Option<String>,

    /// Fields the upstream intake sends that this core does not itself
    /// interpret; kept around so nothing is silently dropped on the way to
    /// the response-assembly step.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    /// The immutable snapshot minted into the correlation store at
    /// admission time.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            portal: self.portal.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            apply_link: self.apply_link.clone(),
            company_name: self.company_name.clone(),
            location: self.location.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// The immutable portion of a job, persisted in the Correlation Store under
/// its minted correlation id and read back when a CareerDocs response
/// arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Option<String>,
    pub portal: Portal,
    pub title: String,
    pub description: String,
    pub apply_link: String,
    pub company_name: String,
    pub location: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
