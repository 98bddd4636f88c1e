// handlers/public/mod.rs - endpoints served without a credential

pub mod flags;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

use crate::AppState;

// GET / - service identity banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "dealboard-admin-api",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

// GET /health - liveness plus a store round-trip
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "healthy"}))),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "degraded", "error": "db_error"})),
            )
        }
    }
}
