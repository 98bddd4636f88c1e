// handlers/admin/moderation.rs - POST /api/admin/users/* handlers

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit;
use crate::error::ApiError;
use crate::guard::{self, AccountRole, AdminContext};
use crate::AppState;

/// POST /api/admin/users/ban
///
/// Banning yourself is refused outright; banning another privileged
/// account takes super_admin.
pub async fn ban(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = moderation_ctx(&state, &headers).await?;
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let user_id = required_user_id(&body)?;

    if user_id == ctx.user_id {
        return Err(ApiError::BadRequest("cannot_ban_self"));
    }
    let target = state
        .store
        .user_account(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    require_super_for_privileged(&ctx, &target.role)?;

    let reason = body
        .get("reason")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let updated = state.store.set_ban(user_id, true, reason.as_deref()).await?;

    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.user.ban",
        "user",
        Some(user_id.to_string()),
        Some(json!({"banned": true, "reason": reason})),
    )
    .await;

    Ok(Json(json!({"ok": true, "user": updated})))
}

/// POST /api/admin/users/unban
pub async fn unban(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = moderation_ctx(&state, &headers).await?;
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let user_id = required_user_id(&body)?;

    let target = state
        .store
        .user_account(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    require_super_for_privileged(&ctx, &target.role)?;

    let updated = state.store.set_ban(user_id, false, None).await?;

    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.user.unban",
        "user",
        Some(user_id.to_string()),
        Some(json!({"banned": false})),
    )
    .await;

    Ok(Json(json!({"ok": true, "user": updated})))
}

/// POST /api/admin/users/verify
///
/// `verified` defaults to true; pass false to strip the badge again.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = moderation_ctx(&state, &headers).await?;
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let user_id = required_user_id(&body)?;
    let verified = body
        .get("verified")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let updated = state.store.set_verified(user_id, verified).await?;

    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.user.verify",
        "user",
        Some(user_id.to_string()),
        Some(json!({"verified": verified})),
    )
    .await;

    Ok(Json(json!({"ok": true, "user": updated})))
}

/// POST /api/admin/users/role
///
/// The role is parsed once and the canonical spelling is what gets
/// stored, so "Super-Admin" and "SUPER_ADMIN" both land as
/// "super_admin". Touching a privileged account, or granting a
/// privileged role, takes super_admin.
pub async fn set_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = moderation_ctx(&state, &headers).await?;
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let user_id = required_user_id(&body)?;

    let new_role = body
        .get("role")
        .and_then(|v| v.as_str())
        .and_then(AccountRole::parse)
        .ok_or(ApiError::BadRequest("invalid_role"))?;

    let target = state
        .store
        .user_account(user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if new_role.is_privileged() {
        require_super(&ctx)?;
    }
    require_super_for_privileged(&ctx, &target.role)?;

    let updated = state.store.set_role(user_id, new_role.as_str()).await?;

    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.user.role_change",
        "user",
        Some(user_id.to_string()),
        Some(json!({"from": target.role, "to": new_role.as_str()})),
    )
    .await;

    Ok(Json(json!({"ok": true, "user": updated})))
}

/// Shared gate for the moderation endpoints: admin bearer, optional
/// impersonation overlay for the audit trail, live elevation window.
async fn moderation_ctx(state: &AppState, headers: &HeaderMap) -> Result<AdminContext, ApiError> {
    let ctx = guard::require_admin(state.store.as_ref(), headers).await?;
    let ctx = guard::with_impersonation(state.store.as_ref(), ctx, headers).await?;
    guard::require_elevation(state.store.as_ref(), &ctx, headers).await?;
    Ok(ctx)
}

fn required_user_id(body: &Value) -> Result<Uuid, ApiError> {
    let raw = body
        .get("user_id")
        .and_then(|v| v.as_str())
        .ok_or(ApiError::BadRequest("missing_user_id"))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid_user_id"))
}

fn require_super(ctx: &AdminContext) -> Result<(), ApiError> {
    if !ctx.role.is_super() {
        tracing::info!(admin_id = %ctx.user_id, "super_admin required");
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

fn require_super_for_privileged(ctx: &AdminContext, target_role: &str) -> Result<(), ApiError> {
    let privileged = AccountRole::parse(target_role)
        .map(|role| role.is_privileged())
        .unwrap_or(false);
    if privileged {
        require_super(ctx)?;
    }
    Ok(())
}
