//! HTTP middleware.
//!
//! - `track_route_metrics`: per-template request metrics (outermost layer)
//! - `request_timeout`: turns slow handlers into `408` responses
//!
//! ```ignore
//! Router::new()
//!     .route("/v1/users/:id", get(handler))
//!     .layer(from_fn_with_state(state.clone(), request_timeout))
//!     .layer(from_fn_with_state(state.clone(), track_route_metrics))
//!     .with_state(state)
//! ```

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use routemetrics_core::RequestMeta;

use crate::app_state::AppState;

/// Record request metrics under the resolved route-template label.
///
/// The observation guard lives across `next.run`; if the inner future is
/// dropped or panics, the guard records the configured failure status.
pub async fn track_route_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();
    let url = display_url(&request);

    let meta = RequestMeta {
        method: &method,
        path: &path,
        url: &url,
    };
    let Some(obs) = state.observer().begin(&meta, state.routes()) else {
        return next.run(request).await;
    };

    let response = next.run(request).await;
    obs.finish_status(response.status().as_u16());
    response
}

pub async fn request_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let limit = state.request_timeout();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "request timed out");
            (StatusCode::REQUEST_TIMEOUT, "request timed out").into_response()
        }
    }
}

/// `scheme://host/path?query`, using the `Host` header when the URI is
/// origin-form (the usual case for HTTP/1.1 servers).
pub fn display_url<B>(request: &axum::http::Request<B>) -> String {
    let uri = request.uri();
    let scheme = uri.scheme_str().unwrap_or("http");
    let host = uri
        .authority()
        .map(|a| a.as_str().to_owned())
        .or_else(|| {
            request
                .headers()
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned)
        })
        .unwrap_or_default();
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    format!("{scheme}://{host}{path_and_query}")
}
