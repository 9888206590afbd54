//! In-memory message bus used by the integration tests in `tests/`.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::delivery::Acker as DeliveryAcker;
use super::{Delivery, MessageBus, Result};

type Queues = Arc<Mutex<HashMap<String, VecDeque<serde_json::Value>>>>;

#[derive(Default, Clone)]
pub struct InMemoryMessageBus {
    queues: Queues,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: messages currently sitting in `queue`, not yet polled.
    pub fn depth(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Test helper: the oldest message in `queue`, without removing it.
    pub fn peek_front(&self, queue: &str) -> Option<serde_json::Value> {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .and_then(|q| q.front())
            .cloned()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, queue: &str, message: serde_json::Value, _persistent: bool) -> Result<()> {
        self.queues
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
        Ok(())
    }

    async fn queue_depth(&self, queue: &str) -> Result<u64> {
        Ok(self.depth(queue) as u64)
    }

    async fn poll(&self, queue: &str) -> Result<Option<Delivery>> {
        let body = {
            let mut queues = self.queues.lock().unwrap();
            queues.get_mut(queue).and_then(VecDeque::pop_front)
        };
        let Some(body) = body else {
            return Ok(None);
        };
        let acker = MemoryAcker {
            queue: queue.to_string(),
            body: body.clone(),
            queues: self.queues.clone(),
        };
        Ok(Some(Delivery::new(body, Box::new(acker))))
    }
}

struct MemoryAcker {
    queue: String,
    body: serde_json::Value,
    queues: Queues,
}

#[async_trait]
impl DeliveryAcker for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        if requeue {
            self.queues
                .lock()
                .unwrap()
                .entry(self.queue.clone())
                .or_default()
                .push_front(self.body.clone());
        }
        Ok(())
    }
}
