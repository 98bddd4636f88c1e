// handlers/admin/audit.rs - GET /api/admin/audit handler

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config;
use crate::error::ApiError;
use crate::guard;
use crate::store::AuditQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditListParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub action: Option<String>,
}

/// GET /api/admin/audit - newest-first page of the audit trail
///
/// Read-only, so the admin bearer alone is enough. Filter with
/// ?action=..., page by passing the previous page's next_cursor back
/// as ?cursor=.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuditListParams>,
) -> Result<Json<Value>, ApiError> {
    guard::require_admin(state.store.as_ref(), &headers).await?;

    let api = &config::config().api;
    let limit = params
        .limit
        .unwrap_or(api.default_page_size)
        .clamp(1, api.max_page_size);
    let cursor = match params.cursor.as_deref() {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| ApiError::BadRequest("invalid_cursor"))?,
        ),
        None => None,
    };
    let action = params.action.filter(|a| !a.trim().is_empty());

    let page = state
        .store
        .list_audit(&AuditQuery { limit, cursor, action })
        .await?;
    Ok(Json(json!({
        "entries": page.entries,
        "next_cursor": page.next_cursor.map(|t| t.to_rfc3339()),
    })))
}
