//! Small demo API so the binary has something to measure.
//!
//! Each handler answers on an axum route whose template is also listed in
//! `routemetrics.yaml`, e.g. axum's `/v1/users/:id` is labeled through the
//! `/v1/users/{id}` template.

use std::time::Duration;

use axum::{extract::Path, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn get_user(Path(id): Path<String>) -> impl IntoResponse {
    match id.parse::<u64>() {
        Ok(n) => (StatusCode::OK, Json(json!({ "id": n, "name": format!("user-{n}") }))),
        Err(_) => (StatusCode::NOT_FOUND, Json(json!({ "error": "user not found" }))),
    }
}

/// `page` is optional; `/v1/users/:id/orders` serves page 1.
pub async fn list_orders(Path(params): Path<Vec<(String, String)>>) -> impl IntoResponse {
    let mut id = None;
    let mut page = 1u32;
    for (k, v) in params {
        match k.as_str() {
            "id" => id = Some(v),
            "page" => match v.parse() {
                Ok(p) => page = p,
                Err(_) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad page" }))),
            },
            _ => {}
        }
    }
    (StatusCode::OK, Json(json!({ "user": id, "page": page, "orders": [] })))
}

/// Reply with an arbitrary status; handy for exercising the error counters.
pub async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

pub async fn slow(Path(ms): Path<u64>) -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(ms.min(60_000))).await;
    (StatusCode::OK, "done")
}
