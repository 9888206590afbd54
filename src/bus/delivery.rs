//! A single received message plus its acknowledgement handle.

use async_trait::async_trait;

use super::Result;

#[async_trait]
pub(crate) trait Acker: Send + Sync {
    async fn ack(&self) -> Result<()>;
    async fn nack(&self, requeue: bool) -> Result<()>;
}

pub struct Delivery {
    pub body: serde_json::Value,
    pub(crate) acker: Box<dyn Acker>,
}

impl Delivery {
    pub(crate) fn new(body: serde_json::Value, acker: Box<dyn Acker>) -> Self {
        Self { body, acker }
    }

    /// Acknowledge the message. Call only after the side effects of
    /// processing it have durably succeeded.
    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }

    /// Negative-acknowledge with requeue, so the outcome is retried — used
    /// when the Artifact Store write fails transiently.
    pub async fn nack_requeue(self) -> Result<()> {
        self.acker.nack(true).await
    }

    /// Acknowledge-and-drop: used for `SchemaInvalid` messages, where
    /// re-delivery would not help.
    pub async fn ack_and_drop(self) -> Result<()> {
        self.acker.ack().await
    }
}
