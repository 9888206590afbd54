//! Ambient `/healthz` surface — a liveness endpoint every long-running
//! service here carries, independent of whatever richer observability is
//! explicitly out of scope. Router wiring follows
//! `server::routes::create_router`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::bus::MessageBus;
use crate::correlation::CorrelationStore;
use crate::store::ArtifactStore;

#[derive(Clone)]
pub struct HealthState {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn ArtifactStore>,
    correlation: Arc<dyn CorrelationStore>,
    probe_queue: String,
}

impl HealthState {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn ArtifactStore>,
        correlation: Arc<dyn CorrelationStore>,
        probe_queue: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            store,
            correlation,
            probe_queue: probe_queue.into(),
        }
    }
}

pub fn create_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<HealthState>) -> impl IntoResponse {
    let bus_ok = state.bus.queue_depth(&state.probe_queue).await.is_ok();
    let store_ok = state.store.get_pending_batch("__healthz__").await.is_ok();
    let correlation_ok = state.correlation.exists("__healthz__").await.is_ok();

    let body = serde_json::json!({
        "bus": bus_ok,
        "artifact_store": store_ok,
        "correlation_store": correlation_ok,
    });

    if bus_ok && store_ok && correlation_ok {
        (StatusCode::OK, Json(body))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}
