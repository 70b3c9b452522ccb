//! Axum router wiring.
//!
//! Demo API + operational endpoints, wrapped by the timeout layer and, on the
//! outside, the route metrics layer.

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::{app_state::AppState, demo, middleware, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(ops::live))
        .route("/health/ready", get(ops::ready))
        .route("/metrics", get(ops::metrics))
        .route("/metrics/json", get(ops::metrics_json))
        .route("/v1/users/:id", get(demo::get_user))
        .route("/v1/users/:id/orders", get(demo::list_orders))
        .route("/v1/users/:id/orders/:page", get(demo::list_orders))
        .route("/v1/status/:code", get(demo::status))
        .route("/v1/slow/:ms", get(demo::slow))
        .fallback(ops::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::request_timeout))
        .layer(from_fn_with_state(state.clone(), middleware::track_route_metrics))
        .with_state(state)
}
