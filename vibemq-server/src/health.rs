//! The `/health/` and `/metrics/` HTTP sidecar (§6 Observability).
//!
//! This endpoint pair is, per spec.md §1, an external collaborator to
//! the broker core: `vibemq-broker` only exposes plain serde-serializable
//! snapshots (`Monitor::health_snapshot`/`metrics_snapshot`); mounting
//! them behind `axum` is this binary crate's job, matching the teacher
//! workspace's own `axum`/`tower-http` dependency entries.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use vibemq_broker::Monitor;

/// Build the sidecar router, wired to the broker's shared [`Monitor`].
pub fn router(monitor: Arc<Monitor>) -> Router {
    Router::new()
        .route("/health/", get(health))
        .route("/metrics/", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(monitor)
}

async fn health(State(monitor): State<Arc<Monitor>>) -> impl IntoResponse {
    // The broker has no failure mode today that leaves it running but
    // unhealthy; `is_healthy` is wired through so a future liveness check
    // (e.g. listener still accepting) has somewhere to report.
    let snapshot = monitor.health_snapshot(true);
    let status = if snapshot.is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(snapshot))
}

async fn metrics(State(monitor): State<Arc<Monitor>>) -> impl IntoResponse {
    Json(monitor.metrics_snapshot())
}
