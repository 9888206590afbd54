//! Message Bus port: durable, at-least-once queue transport with per-queue
//! ordering, manual acknowledgement and observable queue depth.

mod amqp;
mod delivery;
mod memory;

pub use amqp::AmqpMessageBus;
pub use delivery::Delivery;
pub use memory::InMemoryMessageBus;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("message bus unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BusError>;

/// A durable, at-least-once message queue transport.
///
/// Consumers drive their own poll loop (`poll` returns the next delivery, or
/// `None` if the queue is momentarily empty) rather than registering a
/// callback with the bus — this keeps the consumer's own cancellation and
/// ack/nack decisions in its hands: the current message's processing must
/// either complete and ack, or negative-ack with requeue.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a JSON message to `queue`. `persistent` maps to AMQP's
    /// delivery-mode 2.
    async fn publish(&self, queue: &str, message: serde_json::Value, persistent: bool) -> Result<()>;

    /// Approximate current depth of `queue`, used as the refill threshold.
    async fn queue_depth(&self, queue: &str) -> Result<u64>;

    /// Poll for the next available delivery on `queue`. Returns `Ok(None)`
    /// if none is currently available (non-blocking from the caller's
    /// perspective; the AMQP adapter applies a short internal wait so a busy
    /// loop does not spin hot against the broker).
    async fn poll(&self, queue: &str) -> Result<Option<Delivery>>;
}
