// handlers/admin/crud.rs - POST /api/admin/crud handler

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::audit;
use crate::config;
use crate::entity::{self, AdminEntity};
use crate::error::ApiError;
use crate::guard::{self, AdminContext};
use crate::store::{AdminStore, ListQuery};
use crate::AppState;

/// POST /api/admin/crud - one endpoint for entity administration
///
/// `{"op": ..., "entity": ..., ...}` where op is list, get, create,
/// update or delete. The entity name is resolved against a compile-time
/// registry; nothing from the request ever reaches SQL as an
/// identifier. Reads run on the admin bearer alone, writes additionally
/// require a live elevation window.
pub async fn crud(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let ctx = guard::require_admin(state.store.as_ref(), &headers).await?;
    let ctx = guard::with_impersonation(state.store.as_ref(), ctx, &headers).await?;

    let Json(body) = body.map_err(|_| ApiError::BadRequest("invalid_json"))?;
    let op = body
        .get("op")
        .and_then(|v| v.as_str())
        .ok_or(ApiError::BadRequest("invalid_op"))?;

    let entity_name = body.get("entity").and_then(|v| v.as_str()).unwrap_or("");
    let Some(entity) = AdminEntity::parse(entity_name) else {
        debug!(entity = entity_name, "entity not in registry");
        return Err(ApiError::BadRequest("unknown_entity"));
    };

    match op {
        "list" => list(state.store.as_ref(), entity, &body).await,
        "get" => get(state.store.as_ref(), entity, &body).await,
        "create" | "update" | "delete" => {
            guard::require_elevation(state.store.as_ref(), &ctx, &headers).await?;
            match op {
                "create" => create(state.store.as_ref(), &ctx, entity, &body).await,
                "update" => update(state.store.as_ref(), &ctx, entity, &body).await,
                _ => delete(state.store.as_ref(), &ctx, entity, &body).await,
            }
        }
        other => {
            debug!(op = other, "unsupported crud op");
            Err(ApiError::BadRequest("invalid_op"))
        }
    }
}

async fn list(
    store: &dyn AdminStore,
    entity: AdminEntity,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let api = &config::config().api;
    let limit = body
        .get("limit")
        .and_then(|v| v.as_i64())
        .unwrap_or(api.default_page_size)
        .clamp(1, api.max_page_size);
    let cursor = parse_cursor(body)?;
    let filter = body
        .get("filter")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let page = store
        .entity_list(entity, &ListQuery { limit, cursor, filter })
        .await?;
    Ok(Json(json!({
        "items": page.items,
        "next_cursor": page.next_cursor.map(|t| t.to_rfc3339()),
    })))
}

async fn get(
    store: &dyn AdminStore,
    entity: AdminEntity,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let id = required_id(body)?;
    let item = store.entity_get(entity, id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(json!({"item": item})))
}

async fn create(
    store: &dyn AdminStore,
    ctx: &AdminContext,
    entity: AdminEntity,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let data = required_data(body)?;
    entity::validate_payload(entity, data)?;

    let item = store.entity_create(entity, data).await?;
    let item_id = item.get("id").and_then(|v| v.as_str()).map(|s| s.to_string());
    audit::record(
        store,
        ctx,
        "admin.crud.create",
        entity.table(),
        item_id,
        Some(Value::Object(data.clone())),
    )
    .await;

    Ok(Json(json!({"ok": true, "item": item})))
}

async fn update(
    store: &dyn AdminStore,
    ctx: &AdminContext,
    entity: AdminEntity,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let id = required_id(body)?;
    let data = required_data(body)?;
    entity::validate_payload(entity, data)?;

    let item = store
        .entity_update(entity, id, data)
        .await?
        .ok_or(ApiError::NotFound)?;
    audit::record(
        store,
        ctx,
        "admin.crud.update",
        entity.table(),
        Some(id.to_string()),
        Some(Value::Object(data.clone())),
    )
    .await;

    Ok(Json(json!({"ok": true, "item": item})))
}

async fn delete(
    store: &dyn AdminStore,
    ctx: &AdminContext,
    entity: AdminEntity,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let id = required_id(body)?;
    let hard_requested = body
        .get("hard_delete")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    // Entities with a deleted_at column are tombstoned unless the
    // caller explicitly asks for a hard delete
    let mode = if entity.soft_delete() && !hard_requested {
        "soft"
    } else {
        "hard"
    };
    let found = match mode {
        "soft" => store.entity_soft_delete(entity, id, Utc::now()).await?,
        _ => store.entity_hard_delete(entity, id).await?,
    };
    if !found {
        return Err(ApiError::NotFound);
    }

    audit::record(
        store,
        ctx,
        "admin.crud.delete",
        entity.table(),
        Some(id.to_string()),
        Some(json!({"mode": mode})),
    )
    .await;

    Ok(Json(json!({"ok": true, "mode": mode})))
}

fn parse_cursor(body: &Value) -> Result<Option<DateTime<Utc>>, ApiError> {
    match body.get("cursor").and_then(|v| v.as_str()) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| ApiError::BadRequest("invalid_cursor")),
        None => Ok(None),
    }
}

fn required_id(body: &Value) -> Result<Uuid, ApiError> {
    let raw = body
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or(ApiError::BadRequest("missing_id"))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid_id"))
}

fn required_data(body: &Value) -> Result<&Map<String, Value>, ApiError> {
    body.get("data")
        .and_then(|v| v.as_object())
        .ok_or(ApiError::BadRequest("missing_data"))
}
