//! Crate-wide error taxonomy.
//!
//! Each adapter module defines its own error enum (`BusError`, `StoreError`,
//! `CacheError`) and converts into [`OrchestratorError`] at the seam where
//! the orchestration logic actually needs to branch on failure kind.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// MB/AS/CS temporarily unavailable; recover via retry loop, eventually
    /// via batch-retry budget.
    #[error("transient infrastructure failure: {0}")]
    TransientInfra(String),

    /// Retries exhausted; batch marked failed, no further processing.
    #[error("batch {batch_id} unrecoverable after exhausting retries")]
    BatchUnrecoverable { batch_id: String },

    /// Response references a correlation id not in the correlation store.
    #[error("correlation id '{0}' not found")]
    CorrelationMissing(String),

    /// Incoming message fails shape validation.
    #[error("invalid message schema: {0}")]
    SchemaInvalid(String),

    #[error("requested batch was not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Bus(#[from] crate::bus::BusError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Cache(#[from] crate::correlation::CacheError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl OrchestratorError {
    /// Classify whether this error represents transient infrastructure
    /// trouble that a caller should fold into the batch-retry budget rather
    /// than treat as an unrecoverable/programmer error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OrchestratorError::TransientInfra(_)
                | OrchestratorError::Bus(_)
                | OrchestratorError::Store(_)
                | OrchestratorError::Cache(_)
        )
    }
}
