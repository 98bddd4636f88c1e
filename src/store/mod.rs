// store/mod.rs - service-credentialed storage seam
//
// Everything privileged goes through this trait: role lookups, session
// verification, audit appends, entity rows. Bearer identity is resolved
// separately in auth; handlers never touch the database with caller
// credentials.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::entity::AdminEntity;

/// Entity rows travel as plain JSON maps; the registry, not a struct,
/// defines their shape.
pub type JsonRow = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("invalid database url")]
    InvalidDatabaseUrl,

    #[error("not found")]
    NotFound,

    #[error("query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Row in `admin_elevation_sessions`. Only the token hash is kept.
#[derive(Debug, Clone)]
pub struct ElevationSession {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub token_hash: String,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Row in `admin_impersonation_sessions`. Valid only for the exact
/// (admin, target) pair it was issued for.
#[derive(Debug, Clone)]
pub struct ImpersonationSession {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub target_user_id: Uuid,
    pub token_hash: String,
    pub reason: Option<String>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Append-only row in `admin_audit_log`. The actor role is captured at
/// action time so later role changes never rewrite history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub actor_role: String,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub diff: Option<Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub impersonated_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Account row as the moderation endpoints see it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub verified: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub ban_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row in `alert_queue`, one per recipient.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueuedAlert {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub alert_type: String,
    pub deal_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub data: Option<Value>,
    pub dedupe_key: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Alert queue row lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Sent => "sent",
            AlertStatus::Failed => "failed",
            AlertStatus::Skipped => "skipped",
        }
    }
}

/// Alert to enqueue; the store fills in id, status and timestamp.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub recipient_id: Uuid,
    pub alert_type: String,
    pub deal_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub data: Option<Value>,
    pub dedupe_key: String,
}

/// Row in `feature_flags` as the evaluator reads it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeatureFlag {
    pub flag_key: String,
    pub enabled: bool,
    pub rollout_percentage: i32,
    pub payload: Option<Value>,
}

/// Row in `device_push_tokens`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceToken {
    pub user_id: Uuid,
    pub token: String,
}

/// Cursor-paginated entity listing. The cursor is the creation
/// timestamp of the last row the caller has seen.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: i64,
    pub cursor: Option<DateTime<Utc>>,
    pub filter: Option<String>,
}

#[derive(Debug, Default)]
pub struct RowPage {
    pub items: Vec<JsonRow>,
    pub next_cursor: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub limit: i64,
    pub cursor: Option<DateTime<Utc>>,
    pub action: Option<String>,
}

#[derive(Debug, Default)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub next_cursor: Option<DateTime<Utc>>,
}

/// The storage operations the admin surface needs, behind one seam so
/// the HTTP layer can run against Postgres in production and the
/// in-memory store in tests and local work.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // accounts
    async fn user_role(&self, user_id: Uuid) -> Result<Option<String>, StoreError>;
    async fn user_account(&self, user_id: Uuid) -> Result<Option<UserAccount>, StoreError>;
    async fn set_ban(
        &self,
        user_id: Uuid,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<UserAccount, StoreError>;
    async fn set_verified(&self, user_id: Uuid, verified: bool) -> Result<UserAccount, StoreError>;
    async fn set_role(&self, user_id: Uuid, role: &str) -> Result<UserAccount, StoreError>;

    // elevation sessions
    async fn insert_elevation_session(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        valid_until: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn elevation_session_valid(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    async fn purge_expired_elevations(
        &self,
        admin_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    // impersonation sessions
    async fn insert_impersonation_session(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        token_hash: &str,
        reason: Option<&str>,
        valid_until: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn impersonation_session_valid(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // audit trail (append and read; nothing here updates or deletes)
    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;
    async fn list_audit(&self, query: &AuditQuery) -> Result<AuditPage, StoreError>;

    // registry entity rows
    async fn entity_list(&self, entity: AdminEntity, query: &ListQuery)
        -> Result<RowPage, StoreError>;
    async fn entity_get(&self, entity: AdminEntity, id: Uuid)
        -> Result<Option<JsonRow>, StoreError>;
    async fn entity_create(
        &self,
        entity: AdminEntity,
        data: &JsonRow,
    ) -> Result<JsonRow, StoreError>;
    async fn entity_update(
        &self,
        entity: AdminEntity,
        id: Uuid,
        data: &JsonRow,
    ) -> Result<Option<JsonRow>, StoreError>;
    async fn entity_soft_delete(
        &self,
        entity: AdminEntity,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    async fn entity_hard_delete(&self, entity: AdminEntity, id: Uuid) -> Result<bool, StoreError>;

    // alert queue and devices
    async fn deal_saver_ids(&self, deal_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
    async fn deal_follower_ids(&self, deal_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
    async fn enqueue_alerts(&self, alerts: &[NewAlert]) -> Result<u64, StoreError>;
    async fn pending_alerts(&self, limit: i64) -> Result<Vec<QueuedAlert>, StoreError>;
    async fn mark_alerts(&self, ids: &[Uuid], status: AlertStatus) -> Result<(), StoreError>;
    async fn device_tokens(&self, user_ids: &[Uuid]) -> Result<Vec<DeviceToken>, StoreError>;
    async fn remove_device_token(&self, token: &str) -> Result<(), StoreError>;

    // feature flags
    async fn list_flags(&self) -> Result<Vec<FeatureFlag>, StoreError>;
}
