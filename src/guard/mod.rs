// guard/mod.rs - the authorize -> impersonate -> elevate pipeline

pub mod role;
pub mod token;

use axum::http::HeaderMap;
use chrono::Utc;
use uuid::Uuid;

use crate::auth;
use crate::error::ApiError;
use crate::store::AdminStore;

pub use role::{AccountRole, AdminRole};

pub const ELEVATION_HEADER: &str = "x-admin-elevation";
pub const IMPERSONATE_AS_HEADER: &str = "x-impersonate-as";
pub const IMPERSONATE_TOKEN_HEADER: &str = "x-impersonate-token";

/// Per-request admin identity. Built fresh by `require_admin`, refined
/// stage by stage, discarded at response time. Never persisted.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub user_id: Uuid,
    pub role: AdminRole,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub impersonated_user_id: Option<Uuid>,
}

impl AdminContext {
    /// The identity whose data scope the handler acts on. Auditing
    /// always stays under `user_id`, the admin's true identity.
    pub fn effective_user_id(&self) -> Uuid {
        self.impersonated_user_id.unwrap_or(self.user_id)
    }
}

/// First gate of every admin endpoint: a valid bearer plus a privileged
/// role on the account. Reads only; performs no writes.
///
/// Identity comes from the bearer, authority from the accounts table
/// via the service credential. A token can never carry privilege on
/// its own.
pub async fn require_admin(
    store: &dyn AdminStore,
    headers: &HeaderMap,
) -> Result<AdminContext, ApiError> {
    let user_id = auth::verify_bearer(headers)?;

    let role_raw = store.user_role(user_id).await?.ok_or(ApiError::Forbidden)?;
    let role = AdminRole::parse(&role_raw).ok_or_else(|| {
        tracing::info!(user_id = %user_id, "admin surface denied for non-privileged role");
        ApiError::Forbidden
    })?;

    Ok(AdminContext {
        user_id,
        role,
        ip: client_ip(headers),
        user_agent: header_str(headers, "user-agent"),
        impersonated_user_id: None,
    })
}

/// Step-up gate for destructive operations.
///
/// Missing header means the client never elevated (428, prompt to
/// elevate). A header that matches no live session means the window
/// closed (440, prompt to re-elevate). The same token keeps working for
/// the whole window; sessions are time bounds, not one-shot nonces.
pub async fn require_elevation(
    store: &dyn AdminStore,
    ctx: &AdminContext,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    let raw = header_str(headers, ELEVATION_HEADER)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ApiError::ElevationRequired)?;

    let hash = token::hash_token(&raw);
    let valid = store
        .elevation_session_valid(ctx.user_id, &hash, Utc::now())
        .await?;

    if !valid {
        tracing::info!(admin_id = %ctx.user_id, "elevation token rejected");
        return Err(ApiError::ElevationExpired);
    }

    Ok(())
}

/// Overlay impersonation when the paired headers are present.
///
/// A stored session must match admin id, target id and token hash
/// simultaneously; the failure code never says which leg missed, so the
/// endpoint cannot be used to probe for valid combinations. One header
/// without the other is treated the same way.
pub async fn with_impersonation(
    store: &dyn AdminStore,
    ctx: AdminContext,
    headers: &HeaderMap,
) -> Result<AdminContext, ApiError> {
    let target = header_str(headers, IMPERSONATE_AS_HEADER);
    let raw_token = header_str(headers, IMPERSONATE_TOKEN_HEADER);

    let (target, raw_token) = match (target, raw_token) {
        (None, None) => return Ok(ctx),
        (Some(t), Some(k)) => (t, k),
        _ => {
            tracing::info!(admin_id = %ctx.user_id, "impersonation header pair incomplete");
            return Err(ApiError::ImpersonationInvalid);
        }
    };

    let target_id =
        Uuid::parse_str(target.trim()).map_err(|_| ApiError::ImpersonationInvalid)?;
    let hash = token::hash_token(&raw_token);
    let valid = store
        .impersonation_session_valid(ctx.user_id, target_id, &hash, Utc::now())
        .await?;

    if !valid {
        tracing::info!(
            admin_id = %ctx.user_id,
            target_id = %target_id,
            "impersonation session rejected"
        );
        return Err(ApiError::ImpersonationInvalid);
    }

    tracing::info!(admin_id = %ctx.user_id, target_id = %target_id, "acting as impersonated user");

    Ok(AdminContext {
        impersonated_user_id: Some(target_id),
        ..ctx
    })
}

/// Best-effort client address. Proxies in front of this service append
/// to x-forwarded-for; the first hop is the client.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    header_str(headers, "x-real-ip")
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
