// handlers/admin/alerts.rs - POST /api/admin/alerts/queue handler

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

use crate::audit;
use crate::error::ApiError;
use crate::guard;
use crate::store::NewAlert;
use crate::AppState;

/// POST /api/admin/alerts/queue - stage notifications for a deal event
///
/// The audience is the union of explicit recipient_ids, users who saved
/// the deal and users who follow it, de-duplicated. Queueing is
/// idempotent per (recipient, dedupe_key): re-running the same
/// campaign inserts nothing new. Delivery happens separately via
/// /api/admin/push/send.
pub async fn queue(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = guard::require_admin(state.store.as_ref(), &headers).await?;
    let ctx = guard::with_impersonation(state.store.as_ref(), ctx, &headers).await?;

    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let alert_type = required_str(&body, "alert_type")?;
    let title = required_str(&body, "title")?;
    let alert_body = required_str(&body, "body")?;

    let deal_id = match body.get("deal_id").and_then(|v| v.as_str()) {
        Some(raw) => Some(
            Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid_deal_id"))?,
        ),
        None => None,
    };
    let data = body.get("data").filter(|v| v.is_object()).cloned();

    let include_savers = flag(&body, "include_savers");
    let include_followers = flag(&body, "include_followers");
    if (include_savers || include_followers) && deal_id.is_none() {
        return Err(ApiError::BadRequest("missing_deal_id"));
    }

    let mut explicit: Vec<Uuid> = Vec::new();
    if let Some(ids) = body.get("recipient_ids").and_then(|v| v.as_array()) {
        for id in ids {
            let raw = id.as_str().ok_or(ApiError::BadRequest("invalid_user_id"))?;
            explicit
                .push(Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("invalid_user_id"))?);
        }
    }

    let (savers, followers) = match (include_savers, include_followers, deal_id) {
        (true, true, Some(id)) => futures::try_join!(
            state.store.deal_saver_ids(id),
            state.store.deal_follower_ids(id),
        )?,
        (true, false, Some(id)) => (state.store.deal_saver_ids(id).await?, Vec::new()),
        (false, true, Some(id)) => (Vec::new(), state.store.deal_follower_ids(id).await?),
        _ => (Vec::new(), Vec::new()),
    };

    let mut seen = HashSet::new();
    let recipients: Vec<Uuid> = explicit
        .into_iter()
        .chain(savers)
        .chain(followers)
        .filter(|id| seen.insert(*id))
        .collect();

    let dedupe_key = body
        .get("dedupe_key")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            format!(
                "{}:{}",
                alert_type,
                deal_id.map(|d| d.to_string()).unwrap_or_default()
            )
        });

    let alerts: Vec<NewAlert> = recipients
        .iter()
        .map(|recipient_id| NewAlert {
            recipient_id: *recipient_id,
            alert_type: alert_type.to_string(),
            deal_id,
            title: title.to_string(),
            body: alert_body.to_string(),
            data: data.clone(),
            dedupe_key: dedupe_key.clone(),
        })
        .collect();
    let queued = state.store.enqueue_alerts(&alerts).await?;

    // Counts only; recipient lists do not belong in the audit trail
    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.alerts.queue",
        "alert_queue",
        deal_id.map(|d| d.to_string()),
        Some(json!({
            "alert_type": alert_type,
            "dedupe_key": dedupe_key,
            "recipients": recipients.len(),
            "queued": queued,
        })),
    )
    .await;

    Ok(Json(json!({"queued": queued})))
}

fn required_str<'a>(body: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::BadRequest("missing_field"))
}

fn flag(body: &Value, key: &str) -> bool {
    body.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}
