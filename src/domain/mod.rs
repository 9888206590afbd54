//! Strongly-typed domain entities.
//!
//! Boundaries (deserializing a wire message, reading a Mongo document back)
//! validate and produce these types; everything downstream of ingress
//! operates on them rather than on raw JSON.

mod application;
mod batch;
mod job;
mod portal;

pub use application::{AssembledApplication, UserApplications};
pub use batch::{BatchOutcome, BatchStatus, GeneratedArtifacts, PendingBatch};
pub use job::{Job, JobSnapshot};
pub use portal::{ApplierTarget, Portal, NATIVE_PROVIDER_PORTALS};
