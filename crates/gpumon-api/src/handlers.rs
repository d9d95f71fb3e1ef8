//! HTTP handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tracing::error;

use gpumon_core::MetricSchema;

use crate::ApiState;

/// JSON envelope for `/api/v1` responses and scrape failures.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    match gpumon_metrics::render_prometheus(&state.registry) {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, gpumon_metrics::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "exposition failed");
            let body = ApiResponse::<()> {
                success: false,
                data: None,
                error: Some(e.to_string()),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// GET /api/v1/metrics
pub async fn list_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let schemas: Vec<MetricSchema> = state
        .registry
        .declared()
        .iter()
        .map(|observable| observable.schema().clone())
        .collect();
    ApiResponse::ok(schemas)
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
