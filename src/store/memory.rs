// store/memory.rs - in-memory AdminStore used by the integration tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entity::AdminEntity;

use super::{
    AdminStore, AlertStatus, AuditLogEntry, AuditPage, AuditQuery, DeviceToken, ElevationSession,
    FeatureFlag, ImpersonationSession, JsonRow, ListQuery, NewAlert, QueuedAlert, RowPage,
    StoreError, UserAccount,
};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserAccount>,
    elevations: Vec<ElevationSession>,
    impersonations: Vec<ImpersonationSession>,
    audit: Vec<AuditLogEntry>,
    alerts: Vec<QueuedAlert>,
    devices: Vec<DeviceToken>,
    saves: HashMap<Uuid, Vec<Uuid>>,
    follows: HashMap<Uuid, Vec<Uuid>>,
    rows: HashMap<&'static str, Vec<JsonRow>>,
    seq: i64,
    writes: u64,
    fail_audit_appends: u32,
}

impl State {
    /// created_at drives cursor pagination; keep it strictly increasing
    /// even when several writes land within one clock tick.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        self.seq += 1;
        Utc::now() + Duration::microseconds(self.seq)
    }
}

/// Mirrors the Postgres backend closely enough that the handler suite
/// cannot tell them apart: same validity windows, same cursor rules,
/// same dedupe behavior.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn row_id(row: &JsonRow) -> Option<Uuid> {
    row.get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn row_created_at(row: &JsonRow) -> DateTime<Utc> {
    row.get("created_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn matches_filter(entity: AdminEntity, row: &JsonRow, term: &str) -> bool {
    let needle = term.to_lowercase();
    entity.searchable().iter().any(|col| {
        row.get(*col)
            .and_then(|v| v.as_str())
            .map(|s| s.to_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, id: Uuid, email: &str, role: &str) {
        let mut state = self.state.lock().await;
        let created_at = state.next_timestamp();
        state.users.insert(
            id,
            UserAccount {
                id,
                email: email.to_string(),
                role: role.to_string(),
                verified: false,
                banned_at: None,
                ban_reason: None,
                created_at,
            },
        );
    }

    pub async fn seed_device_token(&self, user_id: Uuid, token: &str) {
        let mut state = self.state.lock().await;
        state.devices.push(DeviceToken {
            user_id,
            token: token.to_string(),
        });
    }

    pub async fn seed_deal_save(&self, deal_id: Uuid, user_id: Uuid) {
        let mut state = self.state.lock().await;
        state.saves.entry(deal_id).or_default().push(user_id);
    }

    pub async fn seed_deal_follow(&self, deal_id: Uuid, user_id: Uuid) {
        let mut state = self.state.lock().await;
        state.follows.entry(deal_id).or_default().push(user_id);
    }

    pub async fn seed_flag(
        &self,
        flag_key: &str,
        enabled: bool,
        rollout_percentage: i64,
        payload: Option<Value>,
    ) {
        let mut state = self.state.lock().await;
        let created_at = state.next_timestamp().to_rfc3339();
        let mut row = Map::new();
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        row.insert("flag_key".into(), Value::String(flag_key.to_string()));
        row.insert("enabled".into(), Value::Bool(enabled));
        row.insert(
            "rollout_percentage".into(),
            Value::Number(rollout_percentage.into()),
        );
        row.insert("payload".into(), payload.unwrap_or(Value::Null));
        row.insert("created_at".into(), Value::String(created_at.clone()));
        row.insert("updated_at".into(), Value::String(created_at));
        state.rows.entry("feature_flags").or_default().push(row);
    }

    /// Backdate every elevation session for this admin so the next
    /// privileged call sees an expired window.
    pub async fn expire_elevation_sessions(&self, admin_id: Uuid) {
        let mut state = self.state.lock().await;
        let past = Utc::now() - Duration::hours(1);
        for session in state.elevations.iter_mut() {
            if session.admin_id == admin_id {
                session.valid_until = past;
            }
        }
    }

    pub async fn expire_impersonation_sessions(&self, admin_id: Uuid) {
        let mut state = self.state.lock().await;
        let past = Utc::now() - Duration::hours(1);
        for session in state.impersonations.iter_mut() {
            if session.admin_id == admin_id {
                session.valid_until = past;
            }
        }
    }

    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state.lock().await.audit.clone()
    }

    pub async fn alerts_snapshot(&self) -> Vec<QueuedAlert> {
        self.state.lock().await.alerts.clone()
    }

    pub async fn device_tokens_snapshot(&self) -> Vec<DeviceToken> {
        self.state.lock().await.devices.clone()
    }

    /// Count of store mutations since startup. Seed helpers bypass it,
    /// so a rejected request can be asserted to have written nothing.
    pub async fn write_count(&self) -> u64 {
        self.state.lock().await.writes
    }

    /// Make the next `n` audit appends fail, to exercise retry paths.
    pub async fn fail_next_audit_appends(&self, n: u32) {
        self.state.lock().await.fail_audit_appends = n;
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn user_role(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).map(|u| u.role.clone()))
    }

    async fn user_account(&self, user_id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn set_ban(
        &self,
        user_id: Uuid,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<UserAccount, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.banned_at = if banned { Some(Utc::now()) } else { None };
        user.ban_reason = reason.map(|r| r.to_string());
        Ok(user.clone())
    }

    async fn set_verified(&self, user_id: Uuid, verified: bool) -> Result<UserAccount, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.verified = verified;
        Ok(user.clone())
    }

    async fn set_role(&self, user_id: Uuid, role: &str) -> Result<UserAccount, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.role = role.to_string();
        Ok(user.clone())
    }

    async fn insert_elevation_session(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        valid_until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let created_at = state.next_timestamp();
        state.elevations.push(ElevationSession {
            id: Uuid::new_v4(),
            admin_id,
            token_hash: token_hash.to_string(),
            valid_until,
            created_at,
        });
        Ok(())
    }

    async fn elevation_session_valid(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.elevations.iter().any(|s| {
            s.admin_id == admin_id && s.token_hash == token_hash && s.valid_until > now
        }))
    }

    async fn purge_expired_elevations(
        &self,
        admin_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let before = state.elevations.len();
        state
            .elevations
            .retain(|s| s.admin_id != admin_id || s.valid_until > now);
        Ok((before - state.elevations.len()) as u64)
    }

    async fn insert_impersonation_session(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        token_hash: &str,
        reason: Option<&str>,
        valid_until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let created_at = state.next_timestamp();
        state.impersonations.push(ImpersonationSession {
            id: Uuid::new_v4(),
            admin_id,
            target_user_id,
            token_hash: token_hash.to_string(),
            reason: reason.map(|r| r.to_string()),
            valid_until,
            created_at,
        });
        Ok(())
    }

    async fn impersonation_session_valid(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.impersonations.iter().any(|s| {
            s.admin_id == admin_id
                && s.target_user_id == target_user_id
                && s.token_hash == token_hash
                && s.valid_until > now
        }))
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        if state.fail_audit_appends > 0 {
            state.fail_audit_appends -= 1;
            return Err(StoreError::QueryError("injected audit failure".into()));
        }
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        let state = self.state.lock().await;
        let mut entries: Vec<AuditLogEntry> = state
            .audit
            .iter()
            .filter(|e| query.cursor.map(|c| e.created_at < c).unwrap_or(true))
            .filter(|e| {
                query
                    .action
                    .as_deref()
                    .map(|a| e.action == a)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let has_more = entries.len() as i64 > query.limit;
        entries.truncate(query.limit as usize);
        let next_cursor = if has_more {
            entries.last().map(|e| e.created_at)
        } else {
            None
        };
        Ok(AuditPage { entries, next_cursor })
    }

    async fn entity_list(
        &self,
        entity: AdminEntity,
        query: &ListQuery,
    ) -> Result<RowPage, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<JsonRow> = state
            .rows
            .get(entity.table())
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query
                            .cursor
                            .map(|c| row_created_at(row) < c)
                            .unwrap_or(true)
                    })
                    .filter(|row| {
                        query
                            .filter
                            .as_deref()
                            .map(|term| matches_filter(entity, row, term))
                            .unwrap_or(true)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        items.sort_by_key(|row| std::cmp::Reverse(row_created_at(row)));

        let has_more = items.len() as i64 > query.limit;
        items.truncate(query.limit as usize);
        let next_cursor = if has_more {
            items.last().map(row_created_at)
        } else {
            None
        };
        Ok(RowPage { items, next_cursor })
    }

    async fn entity_get(
        &self,
        entity: AdminEntity,
        id: Uuid,
    ) -> Result<Option<JsonRow>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .get(entity.table())
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id)))
            .cloned())
    }

    async fn entity_create(
        &self,
        entity: AdminEntity,
        data: &JsonRow,
    ) -> Result<JsonRow, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let now = state.next_timestamp().to_rfc3339();

        let mut row = Map::new();
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        for (key, value) in data {
            row.insert(key.clone(), value.clone());
        }
        row.insert("created_at".into(), Value::String(now.clone()));
        row.insert("updated_at".into(), Value::String(now));
        if entity.soft_delete() {
            row.insert("deleted_at".into(), Value::Null);
        }
        state
            .rows
            .entry(entity.table())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn entity_update(
        &self,
        entity: AdminEntity,
        id: Uuid,
        data: &JsonRow,
    ) -> Result<Option<JsonRow>, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let now = state.next_timestamp().to_rfc3339();
        let Some(rows) = state.rows.get_mut(entity.table()) else {
            return Ok(None);
        };
        let Some(row) = rows.iter_mut().find(|row| row_id(row) == Some(id)) else {
            return Ok(None);
        };
        for (key, value) in data {
            row.insert(key.clone(), value.clone());
        }
        row.insert("updated_at".into(), Value::String(now));
        Ok(Some(row.clone()))
    }

    async fn entity_soft_delete(
        &self,
        entity: AdminEntity,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if !entity.soft_delete() {
            return Err(StoreError::QueryError(format!(
                "{} does not support soft delete",
                entity.table()
            )));
        }
        let mut state = self.state.lock().await;
        state.writes += 1;
        let Some(rows) = state.rows.get_mut(entity.table()) else {
            return Ok(false);
        };
        let Some(row) = rows.iter_mut().find(|row| row_id(row) == Some(id)) else {
            return Ok(false);
        };
        row.insert("deleted_at".into(), Value::String(now.to_rfc3339()));
        Ok(true)
    }

    async fn entity_hard_delete(&self, entity: AdminEntity, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let Some(rows) = state.rows.get_mut(entity.table()) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(id));
        Ok(rows.len() < before)
    }

    async fn deal_saver_ids(&self, deal_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.saves.get(&deal_id).cloned().unwrap_or_default())
    }

    async fn deal_follower_ids(&self, deal_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.follows.get(&deal_id).cloned().unwrap_or_default())
    }

    async fn enqueue_alerts(&self, alerts: &[NewAlert]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        let mut inserted = 0u64;
        for alert in alerts {
            let duplicate = state.alerts.iter().any(|existing| {
                existing.recipient_id == alert.recipient_id
                    && existing.dedupe_key == alert.dedupe_key
            });
            if duplicate {
                continue;
            }
            let created_at = state.next_timestamp();
            state.alerts.push(QueuedAlert {
                id: Uuid::new_v4(),
                recipient_id: alert.recipient_id,
                alert_type: alert.alert_type.clone(),
                deal_id: alert.deal_id,
                title: alert.title.clone(),
                body: alert.body.clone(),
                data: alert.data.clone(),
                dedupe_key: alert.dedupe_key.clone(),
                status: AlertStatus::Pending.as_str().to_string(),
                created_at,
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn pending_alerts(&self, limit: i64) -> Result<Vec<QueuedAlert>, StoreError> {
        let state = self.state.lock().await;
        let mut pending: Vec<QueuedAlert> = state
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Pending.as_str())
            .cloned()
            .collect();
        pending.sort_by_key(|a| a.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_alerts(&self, ids: &[Uuid], status: AlertStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        for alert in state.alerts.iter_mut() {
            if ids.contains(&alert.id) {
                alert.status = status.as_str().to_string();
            }
        }
        Ok(())
    }

    async fn device_tokens(&self, user_ids: &[Uuid]) -> Result<Vec<DeviceToken>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .devices
            .iter()
            .filter(|d| user_ids.contains(&d.user_id))
            .cloned()
            .collect())
    }

    async fn remove_device_token(&self, token: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.writes += 1;
        state.devices.retain(|d| d.token != token);
        Ok(())
    }

    async fn list_flags(&self) -> Result<Vec<FeatureFlag>, StoreError> {
        let state = self.state.lock().await;
        let flags = state
            .rows
            .get("feature_flags")
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        let flag_key = row.get("flag_key")?.as_str()?.to_string();
                        Some(FeatureFlag {
                            flag_key,
                            enabled: row
                                .get("enabled")
                                .and_then(|v| v.as_bool())
                                .unwrap_or(false),
                            rollout_percentage: row
                                .get("rollout_percentage")
                                .and_then(|v| v.as_i64())
                                .unwrap_or(0) as i32,
                            payload: row.get("payload").filter(|v| !v.is_null()).cloned(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(flags)
    }
}
