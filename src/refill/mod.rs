//! Refill Loop: keeps `career_docs_queue` topped up via three independent
//! triggers — a periodic timer, a signal raised after each Response
//! Consumer cycle, and an external trigger fed by a separate
//! `application_manager_queue` poller (wired up in `main`'s composition
//! root; the loop itself only sees the resulting channel, not the queue).
//! Modeled on a `tokio::select!` over a sleep and a channel recv, adapted
//! to graceful shutdown via a `tokio::sync::watch<bool>` rather than a
//! `tokio-util::CancellationToken` — no such dependency is carried here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, instrument};

use crate::error::Result;
use crate::publisher::CareerDocsPublisher;

pub struct RefillLoop {
    publisher: Arc<CareerDocsPublisher>,
    period: Duration,
}

impl RefillLoop {
    pub fn new(publisher: Arc<CareerDocsPublisher>, period: Duration) -> Self {
        Self { publisher, period }
    }

    /// Run until `shutdown` reports `true`. Ticks on the periodic timer or
    /// whenever `external_trigger` fires (fed by the Response Consumer after
    /// each processed outcome, or by an `application_manager_queue`
    /// listener — both are treated as equivalent triggers).
    #[instrument(skip(self, shutdown, external_trigger))]
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
        mut external_trigger: tokio::sync::mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.period) => {
                    self.tick("periodic").await;
                }
                Some(()) = external_trigger.recv() => {
                    self.tick("external").await;
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!(event_type = "REFILL_LOOP_STOPPED", "shutdown signal received");
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&self, trigger: &str) {
        match self.publisher.refill().await {
            Ok(published) => {
                info!(event_type = "REFILL_TICK", trigger, published);
            }
            Err(e) => {
                tracing::error!(event_type = "REFILL_TICK_FAILED", trigger, error = %e);
            }
        }
    }

    /// One-shot refill, used by the `refill-once` CLI subcommand.
    pub async fn run_once(&self) -> Result<u64> {
        self.publisher.refill().await
    }
}
