//! Operational HTTP endpoints.
//!
//! - `/health/live`  : liveness
//! - `/health/ready` : readiness (503 when draining)
//! - `/metrics`      : Prometheus text format
//! - `/metrics/json` : series snapshots as JSON
//!
//! All of these sit under the default exclusion list, so scraping never
//! measures itself.

use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};

use routemetrics_core::render_prometheus;

use crate::app_state::AppState;

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = render_prometheus(state.registry(), state.exposition_names());

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn metrics_json(State(state): State<AppState>) -> Response {
    Json(state.registry().snapshot()).into_response()
}
