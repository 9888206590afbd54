//! AMQP 0-9-1 message bus adapter, backed by `lapin`.
//!
//! Reconnects lazily on use rather than via a background keepalive task,
//! mirroring `rabbitmq_client.py`'s `connect()` guard
//! (`if not self.connection or self.connection.is_closed`).

use async_trait::async_trait;
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::delivery::Acker as DeliveryAcker;
use super::{BusError, Delivery, MessageBus, Result};

pub struct AmqpMessageBus {
    url: String,
    channel: Mutex<Option<Channel>>,
}

impl AmqpMessageBus {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel: Mutex::new(None),
        }
    }

    async fn channel(&self) -> Result<Channel> {
        let mut guard = self.channel.lock().await;
        if let Some(ch) = guard.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }
        let conn = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Unavailable(format!("failed to connect to AMQP broker: {e}")))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| BusError::Unavailable(format!("failed to open AMQP channel: {e}")))?;
        info!("connected to AMQP broker");
        *guard = Some(channel.clone());
        Ok(channel)
    }

    async fn ensure_queue(&self, channel: &Channel, queue: &str) -> Result<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Unavailable(format!("failed to declare queue '{queue}': {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MessageBus for AmqpMessageBus {
    async fn publish(&self, queue: &str, message: serde_json::Value, persistent: bool) -> Result<()> {
        let channel = self.channel().await?;
        self.ensure_queue(&channel, queue).await?;
        let body = serde_json::to_vec(&message)?;
        let props = BasicProperties::default()
            .with_delivery_mode(if persistent { 2 } else { 1 });
        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                props,
            )
            .await
            .map_err(|e| BusError::Unavailable(format!("publish to '{queue}' failed: {e}")))?
            .await
            .map_err(|e| BusError::Unavailable(format!("publish to '{queue}' not confirmed: {e}")))?;
        Ok(())
    }

    async fn queue_depth(&self, queue: &str) -> Result<u64> {
        let channel = self.channel().await?;
        let q = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Unavailable(format!("failed to inspect queue '{queue}': {e}")))?;
        Ok(q.message_count() as u64)
    }

    async fn poll(&self, queue: &str) -> Result<Option<Delivery>> {
        let channel = self.channel().await?;
        self.ensure_queue(&channel, queue).await?;
        let got = channel
            .basic_get(queue, BasicGetOptions::default())
            .await
            .map_err(|e| BusError::Unavailable(format!("basic_get on '{queue}' failed: {e}")))?;
        let Some(message) = got else {
            return Ok(None);
        };
        let body: serde_json::Value = match serde_json::from_slice(&message.data) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "dropping undeserializable message");
                let _ = message.acker.ack(BasicAckOptions::default()).await;
                return Ok(None);
            }
        };
        let acker = AmqpAcker {
            acker: message.acker.clone(),
        };
        Ok(Some(Delivery::new(body, Box::new(acker))))
    }
}

struct AmqpAcker {
    acker: lapin::acker::Acker,
}

#[async_trait]
impl DeliveryAcker for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BusError::Unavailable(format!("ack failed: {e}")))
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        self.acker
            .nack(BasicNackOptions {
                requeue,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Unavailable(format!("nack failed: {e}")))
    }
}
