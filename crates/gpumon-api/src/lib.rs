//! gpumon-api: HTTP surface of the exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/api/v1/metrics` | Declared metric schemas |
//! | GET | `/healthz` | Liveness |
//!
//! Every request is cut off after [`REQUEST_TIMEOUT`].

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use gpumon_registry::MetricRegistry;
use tower_http::timeout::TimeoutLayer;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<MetricRegistry>,
}

/// Build the complete router.
pub fn build_router(registry: Arc<MetricRegistry>) -> Router {
    let state = ApiState { registry };

    let api_routes = Router::new()
        .route("/metrics", get(handlers::list_metrics))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
        .route("/healthz", get(handlers::healthz))
        .layer(request_timeout(REQUEST_TIMEOUT))
}

fn request_timeout(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}
