// store/postgres.rs - Postgres-backed AdminStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::entity::AdminEntity;

use super::{
    AdminStore, AlertStatus, AuditLogEntry, AuditPage, AuditQuery, DeviceToken, FeatureFlag,
    JsonRow, ListQuery, NewAlert, QueuedAlert, RowPage, StoreError, UserAccount,
};

/// Idempotent schema bootstrap, run once at startup. `IF NOT EXISTS`
/// keeps redeploys cheap without a migration runner.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS app_users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL DEFAULT 'user',
        verified BOOLEAN NOT NULL DEFAULT FALSE,
        banned_at TIMESTAMPTZ,
        ban_reason TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS admin_elevation_sessions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        admin_id UUID NOT NULL,
        token_hash TEXT NOT NULL,
        valid_until TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_elevation_lookup
        ON admin_elevation_sessions (admin_id, token_hash)",
    "CREATE TABLE IF NOT EXISTS admin_impersonation_sessions (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        admin_id UUID NOT NULL,
        target_user_id UUID NOT NULL,
        token_hash TEXT NOT NULL,
        reason TEXT,
        valid_until TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS admin_audit_log (
        id UUID PRIMARY KEY,
        actor_id UUID NOT NULL,
        actor_role TEXT NOT NULL,
        action TEXT NOT NULL,
        target_type TEXT,
        target_id TEXT,
        diff JSONB,
        ip TEXT,
        user_agent TEXT,
        impersonated_user_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_created ON admin_audit_log (created_at DESC)",
    "CREATE TABLE IF NOT EXISTS alert_queue (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        recipient_id UUID NOT NULL,
        alert_type TEXT NOT NULL,
        deal_id UUID,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        data JSONB,
        dedupe_key TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (recipient_id, dedupe_key)
    )",
    "CREATE TABLE IF NOT EXISTS device_push_tokens (
        user_id UUID NOT NULL,
        token TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS deal_saves (
        user_id UUID NOT NULL,
        deal_id UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (user_id, deal_id)
    )",
    "CREATE TABLE IF NOT EXISTS deal_follows (
        user_id UUID NOT NULL,
        deal_id UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (user_id, deal_id)
    )",
    "CREATE TABLE IF NOT EXISTS deals (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        title TEXT NOT NULL,
        description TEXT,
        url TEXT,
        image_url TEXT,
        price_cents BIGINT,
        original_price_cents BIGINT,
        store_id UUID,
        category_id UUID,
        posted_by UUID,
        status TEXT NOT NULL DEFAULT 'active',
        expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        deal_id UUID,
        author_id UUID,
        body TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'visible',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS reports (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        deal_id UUID,
        reporter_id UUID,
        reason TEXT,
        status TEXT NOT NULL DEFAULT 'open',
        resolution_note TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS stores (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name TEXT NOT NULL,
        website TEXT,
        logo_url TEXT,
        affiliate_tag TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS categories (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name TEXT NOT NULL,
        slug TEXT,
        icon TEXT,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS feature_flags (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        flag_key TEXT NOT NULL UNIQUE,
        description TEXT,
        enabled BOOLEAN NOT NULL DEFAULT FALSE,
        rollout_percentage INTEGER NOT NULL DEFAULT 0,
        payload JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
];

const USER_COLUMNS: &str = "id, email, role, verified, banned_at, ban_reason, created_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect using DATABASE_URL and bring the schema up to date.
    /// A missing or unreachable credential fails here, at startup, not
    /// on the first privileged request.
    pub async fn connect() -> Result<Self, StoreError> {
        let dsn = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;
        let parsed = url::Url::parse(&dsn).map_err(|_| StoreError::InvalidDatabaseUrl)?;

        let db_config = &config::config().database;
        let pool = PgPoolOptions::new()
            .max_connections(db_config.max_connections)
            .acquire_timeout(Duration::from_secs(db_config.connection_timeout))
            .connect(&dsn)
            .await?;

        // Log where we connected without echoing credentials
        info!(
            host = parsed.host_str().unwrap_or("?"),
            database = parsed.path().trim_start_matches('/'),
            "connected to postgres"
        );

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("schema bootstrap complete");
        Ok(())
    }
}

/// Bind a JSON value by its own shape; column-type casts in the SQL
/// turn text binds into uuid/timestamptz/jsonb where needed.
fn bind_json<'q>(
    q: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => q.bind(Option::<&str>::None),
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => q.bind(i),
            None => q.bind(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => q.bind(s.as_str()),
        other => q.bind(other.clone()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape the user's search term so ILIKE treats it literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn list_sql(entity: AdminEntity, has_cursor: bool, has_filter: bool) -> String {
    let mut sql = format!("SELECT * FROM {}", entity.table());
    let mut clauses: Vec<String> = Vec::new();
    let mut arg = 0;

    if has_cursor {
        arg += 1;
        clauses.push(format!("created_at < ${}", arg));
    }
    if has_filter {
        arg += 1;
        let cols: Vec<String> = entity
            .searchable()
            .iter()
            .map(|col| format!("{} ILIKE ${}", col, arg))
            .collect();
        clauses.push(format!("({})", cols.join(" OR ")));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    arg += 1;
    sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ${}", arg));
    sql
}

fn audit_sql(has_cursor: bool, has_action: bool) -> String {
    let mut sql = String::from("SELECT * FROM admin_audit_log");
    let mut clauses: Vec<String> = Vec::new();
    let mut arg = 0;

    if has_cursor {
        arg += 1;
        clauses.push(format!("created_at < ${}", arg));
    }
    if has_action {
        arg += 1;
        clauses.push(format!("action = ${}", arg));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    arg += 1;
    sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ${}", arg));
    sql
}

/// Convert one row to a JSON map by probing the common column types.
/// The first compatible decode wins; anything unexpected comes back as
/// null rather than failing the whole row.
fn row_to_map(row: &PgRow) -> JsonRow {
    let mut map = Map::new();
    for i in 0..row.len() {
        map.insert(row.column(i).name().to_string(), column_value(row, i));
    }
    map
}

fn column_value(row: &PgRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(i) {
        return v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Uuid>, _>(i) {
        return v.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(i) {
        return v.map(|t| Value::String(t.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return v
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(i) {
        return v.unwrap_or(Value::Null);
    }
    Value::Null
}

#[async_trait]
impl AdminStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn user_role(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        let role = sqlx::query_scalar::<_, String>("SELECT role FROM app_users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn user_account(&self, user_id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        let sql = format!("SELECT {} FROM app_users WHERE id = $1", USER_COLUMNS);
        let account = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn set_ban(
        &self,
        user_id: Uuid,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<UserAccount, StoreError> {
        let sql = format!(
            "UPDATE app_users
             SET banned_at = CASE WHEN $2 THEN NOW() ELSE NULL END, ban_reason = $3
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserAccount>(&sql)
            .bind(user_id)
            .bind(banned)
            .bind(reason)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn set_verified(&self, user_id: Uuid, verified: bool) -> Result<UserAccount, StoreError> {
        let sql = format!(
            "UPDATE app_users SET verified = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserAccount>(&sql)
            .bind(user_id)
            .bind(verified)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn set_role(&self, user_id: Uuid, role: &str) -> Result<UserAccount, StoreError> {
        let sql = format!(
            "UPDATE app_users SET role = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserAccount>(&sql)
            .bind(user_id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn insert_elevation_session(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        valid_until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO admin_elevation_sessions (admin_id, token_hash, valid_until)
             VALUES ($1, $2, $3)",
        )
        .bind(admin_id)
        .bind(token_hash)
        .bind(valid_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn elevation_session_valid(
        &self,
        admin_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let valid = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM admin_elevation_sessions
                 WHERE admin_id = $1 AND token_hash = $2 AND valid_until > $3
             )",
        )
        .bind(admin_id)
        .bind(token_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(valid)
    }

    async fn purge_expired_elevations(
        &self,
        admin_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM admin_elevation_sessions WHERE admin_id = $1 AND valid_until <= $2",
        )
        .bind(admin_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_impersonation_session(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        token_hash: &str,
        reason: Option<&str>,
        valid_until: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO admin_impersonation_sessions
                 (admin_id, target_user_id, token_hash, reason, valid_until)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(admin_id)
        .bind(target_user_id)
        .bind(token_hash)
        .bind(reason)
        .bind(valid_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn impersonation_session_valid(
        &self,
        admin_id: Uuid,
        target_user_id: Uuid,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let valid = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM admin_impersonation_sessions
                 WHERE admin_id = $1 AND target_user_id = $2
                   AND token_hash = $3 AND valid_until > $4
             )",
        )
        .bind(admin_id)
        .bind(target_user_id)
        .bind(token_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(valid)
    }

    async fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO admin_audit_log
                 (id, actor_id, actor_role, action, target_type, target_id,
                  diff, ip, user_agent, impersonated_user_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(entry.id)
        .bind(entry.actor_id)
        .bind(&entry.actor_role)
        .bind(&entry.action)
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(&entry.diff)
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .bind(entry.impersonated_user_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<AuditPage, StoreError> {
        let sql = audit_sql(query.cursor.is_some(), query.action.is_some());
        let mut q = sqlx::query_as::<_, AuditLogEntry>(&sql);
        if let Some(cursor) = query.cursor {
            q = q.bind(cursor);
        }
        if let Some(action) = &query.action {
            q = q.bind(action);
        }
        q = q.bind(query.limit + 1);

        let mut entries = q.fetch_all(&self.pool).await?;
        let has_more = entries.len() as i64 > query.limit;
        if has_more {
            entries.truncate(query.limit as usize);
        }
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
        let sql = list_sql(entity, query.cursor.is_some(), query.filter.is_some());
        let mut q = sqlx::query(&sql);
        if let Some(cursor) = query.cursor {
            q = q.bind(cursor);
        }
        let pattern;
        if let Some(filter) = &query.filter {
            pattern = format!("%{}%", escape_like(filter));
            q = q.bind(&pattern);
        }
        q = q.bind(query.limit + 1);

        let rows = q.fetch_all(&self.pool).await?;
        let has_more = rows.len() as i64 > query.limit;

        let mut items = Vec::with_capacity(rows.len().min(query.limit as usize));
        for row in rows.iter().take(query.limit as usize) {
            items.push(row_to_map(row));
        }
        let next_cursor = if has_more {
            rows.get(query.limit as usize - 1)
                .and_then(|row| row.try_get::<DateTime<Utc>, _>("created_at").ok())
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
        let sql = format!("SELECT * FROM {} WHERE id = $1", entity.table());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_map(&r)))
    }

    async fn entity_create(
        &self,
        entity: AdminEntity,
        data: &JsonRow,
    ) -> Result<JsonRow, StoreError> {
        let mut cols = Vec::with_capacity(data.len());
        let mut params = Vec::with_capacity(data.len());
        for (i, key) in data.keys().enumerate() {
            let Some(col_type) = entity.col_type(key) else {
                return Err(StoreError::QueryError(format!(
                    "column not in registry: {}",
                    key
                )));
            };
            cols.push(quote_ident(key));
            params.push(format!("${}{}", i + 1, col_type.sql_cast()));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            entity.table(),
            cols.join(", "),
            params.join(", ")
        );

        let mut q = sqlx::query(&sql);
        for value in data.values() {
            q = bind_json(q, value);
        }
        let row = q.fetch_one(&self.pool).await?;
        Ok(row_to_map(&row))
    }

    async fn entity_update(
        &self,
        entity: AdminEntity,
        id: Uuid,
        data: &JsonRow,
    ) -> Result<Option<JsonRow>, StoreError> {
        let mut sets = Vec::with_capacity(data.len() + 1);
        let mut arg = 0;
        for key in data.keys() {
            let Some(col_type) = entity.col_type(key) else {
                return Err(StoreError::QueryError(format!(
                    "column not in registry: {}",
                    key
                )));
            };
            arg += 1;
            sets.push(format!("{} = ${}{}", quote_ident(key), arg, col_type.sql_cast()));
        }
        sets.push("updated_at = NOW()".to_string());
        arg += 1;
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ${} RETURNING *",
            entity.table(),
            sets.join(", "),
            arg
        );

        let mut q = sqlx::query(&sql);
        for value in data.values() {
            q = bind_json(q, value);
        }
        q = q.bind(id);
        let row = q.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_map(&r)))
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
        let sql = format!("UPDATE {} SET deleted_at = $1 WHERE id = $2", entity.table());
        let result = sqlx::query(&sql)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn entity_hard_delete(&self, entity: AdminEntity, id: Uuid) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", entity.table());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deal_saver_ids(&self, deal_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM deal_saves WHERE deal_id = $1")
            .bind(deal_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn deal_follower_ids(&self, deal_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids =
            sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM deal_follows WHERE deal_id = $1")
                .bind(deal_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn enqueue_alerts(&self, alerts: &[NewAlert]) -> Result<u64, StoreError> {
        let mut inserted = 0u64;
        for alert in alerts {
            let result = sqlx::query(
                "INSERT INTO alert_queue
                     (recipient_id, alert_type, deal_id, title, body, data, dedupe_key)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (recipient_id, dedupe_key) DO NOTHING",
            )
            .bind(alert.recipient_id)
            .bind(&alert.alert_type)
            .bind(alert.deal_id)
            .bind(&alert.title)
            .bind(&alert.body)
            .bind(&alert.data)
            .bind(&alert.dedupe_key)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn pending_alerts(&self, limit: i64) -> Result<Vec<QueuedAlert>, StoreError> {
        let alerts = sqlx::query_as::<_, QueuedAlert>(
            "SELECT * FROM alert_queue WHERE status = 'pending'
             ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }

    async fn mark_alerts(&self, ids: &[Uuid], status: AlertStatus) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE alert_queue SET status = $1 WHERE id = ANY($2)")
            .bind(status.as_str())
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn device_tokens(&self, user_ids: &[Uuid]) -> Result<Vec<DeviceToken>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = sqlx::query_as::<_, DeviceToken>(
            "SELECT user_id, token FROM device_push_tokens WHERE user_id = ANY($1)",
        )
        .bind(user_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(tokens)
    }

    async fn remove_device_token(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM device_push_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_flags(&self) -> Result<Vec<FeatureFlag>, StoreError> {
        let flags = sqlx::query_as::<_, FeatureFlag>(
            "SELECT flag_key, enabled, rollout_percentage, payload FROM feature_flags",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(flags)
    }
}
