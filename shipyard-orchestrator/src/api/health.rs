//! Health Check API Handler

use axum::Json;
use serde_json::{Value, json};

/// GET /health
/// Liveness probe; does not touch the store
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
