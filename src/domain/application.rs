//! `AssembledApplication` — the artifact a user reviews and approves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::JobSnapshot;

/// Lives under `assembled_applications[user_id].content[id]`. `id` equals
/// the correlation id that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledApplication {
    #[serde(flatten)]
    pub job: JobSnapshot,
    pub resume_optimized: serde_json::Value,
    pub cover_letter: serde_json::Value,
    #[serde(default)]
    pub style: Option<String>,
    pub sent: bool,
    #[serde(default)]
    pub gen_cv: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub id: String,
}

impl AssembledApplication {
    /// Compose from a job snapshot (read back from the Correlation Store)
    /// and the artifacts CareerDocs produced.
    pub fn assemble(
        correlation_id: String,
        job: JobSnapshot,
        resume_optimized: serde_json::Value,
        cover_letter: serde_json::Value,
        style: Option<String>,
        gen_cv: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job,
            resume_optimized,
            cover_letter,
            style,
            sent: false,
            gen_cv,
            timestamp: now,
            id: correlation_id,
        }
    }

    /// Flip `sent` false->true. Callers must only invoke this once; the
    /// per-lifetime single-transition invariant is enforced by the Dispatch
    /// Publisher only ever selecting unsent applications.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.sent = true;
        self.timestamp = at;
    }
}

/// One user's `assembled_applications` document: `{ _id, user_id, content }`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserApplications {
    pub user_id: String,
    pub content: std::collections::HashMap<String, AssembledApplication>,
}
