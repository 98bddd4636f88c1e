// audit/mod.rs - audit trail recorder

use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use crate::guard::AdminContext;
use crate::store::{AdminStore, AuditLogEntry};

const APPEND_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Append one audit row for a completed admin action. The append is
/// awaited before the response goes out so the trail stays in step with
/// the data, and retried on store hiccups. A persistent failure is
/// logged and dropped; the action already happened, so failing the
/// caller here would only invite a retry of the action itself.
pub async fn record(
    store: &dyn AdminStore,
    ctx: &AdminContext,
    action: &str,
    target_type: &str,
    target_id: Option<String>,
    diff: Option<Value>,
) {
    let entry = AuditLogEntry {
        id: Uuid::new_v4(),
        actor_id: ctx.user_id,
        actor_role: ctx.role.as_str().to_string(),
        action: action.to_string(),
        target_type: Some(target_type.to_string()),
        target_id,
        diff,
        ip: ctx.ip.clone(),
        user_agent: ctx.user_agent.clone(),
        impersonated_user_id: ctx.impersonated_user_id,
        created_at: Utc::now(),
    };

    let mut attempt = 0;
    loop {
        match store.append_audit(&entry).await {
            Ok(()) => return,
            Err(err) if attempt < APPEND_RETRIES => {
                attempt += 1;
                warn!(
                    action = action,
                    attempt = attempt,
                    error = %err,
                    "audit append failed, retrying"
                );
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(err) => {
                error!(action = action, error = %err, "audit entry dropped after retries");
                return;
            }
        }
    }
}
