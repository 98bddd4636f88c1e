// handlers/admin/push.rs - POST /api/admin/push/send handler

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

use crate::audit;
use crate::config;
use crate::error::ApiError;
use crate::guard;
use crate::push::PushMessage;
use crate::store::AlertStatus;
use crate::AppState;

/// POST /api/admin/push/send - drain pending alerts through the relay
///
/// Each drained alert ends in exactly one state: sent when at least one
/// of the recipient's devices took it, failed when every device
/// refused, skipped when the recipient has no devices at all. A
/// transport failure stops the drain and leaves the remainder pending
/// for the next run. Tokens the relay reports as dead are dropped.
pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let ctx = guard::require_admin(state.store.as_ref(), &headers).await?;
    let ctx = guard::with_impersonation(state.store.as_ref(), ctx, &headers).await?;
    guard::require_elevation(state.store.as_ref(), &ctx, &headers).await?;

    let push_config = &config::config().push;
    let limit = body
        .and_then(|Json(v)| v.get("limit").and_then(|l| l.as_i64()))
        .unwrap_or(push_config.default_drain_limit)
        .clamp(1, push_config.max_drain_limit);

    let alerts = state.store.pending_alerts(limit).await?;

    let recipient_ids: Vec<Uuid> = alerts
        .iter()
        .map(|a| a.recipient_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let mut devices: HashMap<Uuid, Vec<String>> = HashMap::new();
    for device in state.store.device_tokens(&recipient_ids).await? {
        devices.entry(device.user_id).or_default().push(device.token);
    }

    // One message per (alert, device); recipients without a device are
    // settled as skipped before anything goes on the wire
    let mut skipped: Vec<Uuid> = Vec::new();
    let mut alert_ids: Vec<Uuid> = Vec::new();
    let mut messages: Vec<PushMessage> = Vec::new();
    for alert in &alerts {
        match devices.get(&alert.recipient_id) {
            Some(tokens) if !tokens.is_empty() => {
                for token in tokens {
                    alert_ids.push(alert.id);
                    messages.push(PushMessage {
                        to: token.clone(),
                        title: alert.title.clone(),
                        body: alert.body.clone(),
                        data: alert.data.clone(),
                    });
                }
            }
            _ => skipped.push(alert.id),
        }
    }

    let mut attempted: HashSet<Uuid> = HashSet::new();
    let mut delivered: HashSet<Uuid> = HashSet::new();
    let batch = push_config.batch_size;
    for (chunk, ids) in messages.chunks(batch).zip(alert_ids.chunks(batch)) {
        let tickets = match state.push.send_batch(chunk).await {
            Ok(tickets) => tickets,
            Err(err) => {
                warn!(error = %err, "push relay unreachable, leaving remainder pending");
                break;
            }
        };
        attempted.extend(ids.iter().copied());
        for ((message, alert_id), ticket) in chunk.iter().zip(ids).zip(tickets.iter()) {
            if ticket.delivered() {
                delivered.insert(*alert_id);
            } else if ticket.device_gone() {
                if let Err(err) = state.store.remove_device_token(&message.to).await {
                    warn!(error = %err, "failed to drop dead device token");
                }
            }
        }
    }

    let sent_ids: Vec<Uuid> = attempted.intersection(&delivered).copied().collect();
    let failed_ids: Vec<Uuid> = attempted.difference(&delivered).copied().collect();

    state.store.mark_alerts(&sent_ids, AlertStatus::Sent).await?;
    state.store.mark_alerts(&failed_ids, AlertStatus::Failed).await?;
    state.store.mark_alerts(&skipped, AlertStatus::Skipped).await?;

    audit::record(
        state.store.as_ref(),
        &ctx,
        "admin.push.send",
        "alert_queue",
        None,
        Some(json!({
            "sent": sent_ids.len(),
            "failed": failed_ids.len(),
            "skipped": skipped.len(),
        })),
    )
    .await;

    Ok(Json(json!({
        "sent": sent_ids.len(),
        "failed": failed_ids.len(),
        "skipped": skipped.len(),
    })))
}
