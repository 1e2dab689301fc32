//! Liveness endpoint.

use axum::response::Json;
use serde_json::{Value, json};
use tracing::trace;

/// `GET /health`
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({ "ok": true }))
}
