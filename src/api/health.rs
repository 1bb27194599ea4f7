//! Liveness endpoint

use axum::{Json, Router, routing::get};

/// Report the service as alive, with its crate version
async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the health router; no state required
pub fn router() -> Router {
    Router::new().route("/health", get(liveness))
}
