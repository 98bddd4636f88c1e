// handlers/admin/elevate.rs - POST /api/admin/elevate handler

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::audit;
use crate::config;
use crate::error::ApiError;
use crate::guard::{self, token};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ElevateRequest {
    pub ttl_minutes: Option<i64>,
}

/// POST /api/admin/elevate - open a step-up window
///
/// Needs only the admin bearer. The requested TTL is clamped into the
/// configured bounds rather than rejected; a missing or malformed body
/// gets the default. The response carries the raw token exactly once,
/// the store keeps its SHA-256 only.
pub async fn elevate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ElevateRequest>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = guard::require_admin(state.store.as_ref(), &headers).await?;

    let security = &config::config().security;
    let ttl = body
        .and_then(|Json(request)| request.ttl_minutes)
        .unwrap_or(security.elevation_default_ttl_minutes)
        .clamp(1, security.elevation_max_ttl_minutes);

    let (raw_token, token_hash) = token::generate_token();
    let valid_until = Utc::now() + Duration::minutes(ttl);
    state
        .store
        .insert_elevation_session(ctx.user_id, &token_hash, valid_until)
        .await?;

    // Opportunistic cleanup; failure must not fail the issuance
    if let Err(err) = state
        .store
        .purge_expired_elevations(ctx.user_id, Utc::now())
        .await
    {
        warn!(admin_id = %ctx.user_id, error = %err, "expired elevation purge failed");
    }

    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.elevate",
        "elevation_session",
        None,
        Some(json!({"ttl_minutes": ttl})),
    )
    .await;

    Ok(Json(json!({
        "token": raw_token,
        "valid_until": valid_until.to_rfc3339(),
    })))
}
