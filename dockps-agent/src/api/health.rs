//! Health Check API Handler

use axum::Json;
use serde_json::{Value, json};

/// GET /
/// Liveness check, still behind the auth key
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": env!("CARGO_PKG_NAME") }))
}
