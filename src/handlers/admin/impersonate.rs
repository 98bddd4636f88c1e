// handlers/admin/impersonate.rs - POST /api/admin/impersonate handler

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit;
use crate::config;
use crate::error::ApiError;
use crate::guard::{self, token, AccountRole};
use crate::AppState;

/// POST /api/admin/impersonate - issue an act-as session
///
/// Requires admin plus a live elevation window; opening an act-as
/// session is itself a destructive capability. The target must exist,
/// must not be the caller, and must not hold a privileged role.
pub async fn impersonate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = guard::require_admin(state.store.as_ref(), &headers).await?;
    guard::require_elevation(state.store.as_ref(), &ctx, &headers).await?;

    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let target_raw = body
        .get("target_user_id")
        .and_then(|v| v.as_str())
        .ok_or(ApiError::BadRequest("missing_target"))?;
    let target_id =
        Uuid::parse_str(target_raw).map_err(|_| ApiError::BadRequest("invalid_user_id"))?;

    if target_id == ctx.user_id {
        return Err(ApiError::BadRequest("cannot_impersonate_self"));
    }

    let target = state
        .store
        .user_account(target_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let privileged = AccountRole::parse(&target.role)
        .map(|role| role.is_privileged())
        .unwrap_or(false);
    if privileged {
        tracing::info!(
            admin_id = %ctx.user_id,
            target_id = %target_id,
            "refused impersonation of privileged account"
        );
        return Err(ApiError::Forbidden);
    }

    let security = &config::config().security;
    let ttl = body
        .get("ttl_minutes")
        .and_then(|v| v.as_i64())
        .unwrap_or(security.impersonation_default_ttl_minutes)
        .clamp(1, security.impersonation_max_ttl_minutes);
    let reason = body
        .get("reason")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let (raw_token, token_hash) = token::generate_token();
    let valid_until = Utc::now() + Duration::minutes(ttl);
    state
        .store
        .insert_impersonation_session(
            ctx.user_id,
            target_id,
            &token_hash,
            reason.as_deref(),
            valid_until,
        )
        .await?;

    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.impersonate.start",
        "user",
        Some(target_id.to_string()),
        Some(json!({"ttl_minutes": ttl, "reason": reason})),
    )
    .await;

    Ok(Json(json!({
        "token": raw_token,
        "valid_until": valid_until.to_rfc3339(),
        "target_user_id": target_id.to_string(),
    })))
}
