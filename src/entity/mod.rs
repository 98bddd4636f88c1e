// entity/mod.rs - closed registry of tables reachable through admin CRUD

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;

/// Column names the API never lets a caller write.
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at", "deleted_at"];

/// SQL-side type of a writable column, used to pick the bind cast and
/// to validate payload values before anything touches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColType {
    Text,
    Int,
    Bool,
    Uuid,
    Timestamp,
    Json,
}

impl ColType {
    /// Explicit cast appended to the bind placeholder. Strings bind as
    /// text; the cast turns them into the column's real type.
    pub fn sql_cast(&self) -> &'static str {
        match self {
            ColType::Text | ColType::Int | ColType::Bool => "",
            ColType::Uuid => "::uuid",
            ColType::Timestamp => "::timestamptz",
            ColType::Json => "::jsonb",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            ColType::Text => value.is_string(),
            ColType::Int => value.as_i64().is_some(),
            ColType::Bool => value.is_boolean(),
            ColType::Uuid => value
                .as_str()
                .map(|s| Uuid::parse_str(s).is_ok())
                .unwrap_or(false),
            ColType::Timestamp => value
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
            ColType::Json => value.is_object() || value.is_array(),
        }
    }
}

/// The tables admin CRUD may touch. There is no dynamic table path:
/// anything that does not parse into this enum is rejected before any
/// query is built, which removes the injection class entirely.
///
/// Account rows are deliberately absent. Bans, verification and role
/// changes go through the dedicated moderation endpoints so the generic
/// surface can never flip a role or a ban flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminEntity {
    Deals,
    Comments,
    Reports,
    Stores,
    Categories,
    FeatureFlags,
}

impl AdminEntity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "deals" => Some(Self::Deals),
            "comments" => Some(Self::Comments),
            "reports" => Some(Self::Reports),
            "stores" => Some(Self::Stores),
            "categories" => Some(Self::Categories),
            "feature_flags" => Some(Self::FeatureFlags),
            _ => None,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Deals => "deals",
            Self::Comments => "comments",
            Self::Reports => "reports",
            Self::Stores => "stores",
            Self::Categories => "categories",
            Self::FeatureFlags => "feature_flags",
        }
    }

    /// Entities whose rows are kept around after deletion. Moderators
    /// need removed content to stay reviewable.
    pub fn soft_delete(&self) -> bool {
        matches!(self, Self::Deals | Self::Comments | Self::Stores)
    }

    /// Columns a free-text list filter may match against.
    pub fn searchable(&self) -> &'static [&'static str] {
        match self {
            Self::Deals => &["title", "description"],
            Self::Comments => &["body"],
            Self::Reports => &["reason", "status"],
            Self::Stores => &["name", "website"],
            Self::Categories => &["name", "slug"],
            Self::FeatureFlags => &["flag_key", "description"],
        }
    }

    /// Columns accepted in create/update payloads, with their types.
    pub fn writable(&self) -> &'static [(&'static str, ColType)] {
        match self {
            Self::Deals => &[
                ("title", ColType::Text),
                ("description", ColType::Text),
                ("url", ColType::Text),
                ("image_url", ColType::Text),
                ("price_cents", ColType::Int),
                ("original_price_cents", ColType::Int),
                ("store_id", ColType::Uuid),
                ("category_id", ColType::Uuid),
                ("posted_by", ColType::Uuid),
                ("status", ColType::Text),
                ("expires_at", ColType::Timestamp),
            ],
            Self::Comments => &[
                ("deal_id", ColType::Uuid),
                ("author_id", ColType::Uuid),
                ("body", ColType::Text),
                ("status", ColType::Text),
            ],
            Self::Reports => &[
                ("deal_id", ColType::Uuid),
                ("reporter_id", ColType::Uuid),
                ("reason", ColType::Text),
                ("status", ColType::Text),
                ("resolution_note", ColType::Text),
            ],
            Self::Stores => &[
                ("name", ColType::Text),
                ("website", ColType::Text),
                ("logo_url", ColType::Text),
                ("affiliate_tag", ColType::Text),
            ],
            Self::Categories => &[
                ("name", ColType::Text),
                ("slug", ColType::Text),
                ("icon", ColType::Text),
                ("sort_order", ColType::Int),
            ],
            Self::FeatureFlags => &[
                ("flag_key", ColType::Text),
                ("description", ColType::Text),
                ("enabled", ColType::Bool),
                ("rollout_percentage", ColType::Int),
                ("payload", ColType::Json),
            ],
        }
    }

    pub fn col_type(&self, column: &str) -> Option<ColType> {
        self.writable()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, ty)| *ty)
    }
}

/// Check a write payload against the entity's allow-list. System fields,
/// unknown columns and type-mismatched values are all rejected before a
/// query exists to inject into.
pub fn validate_payload(entity: AdminEntity, data: &Map<String, Value>) -> Result<(), ApiError> {
    if data.is_empty() {
        return Err(ApiError::BadRequest("missing_data"));
    }
    for (key, value) in data {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            tracing::debug!(entity = entity.table(), field = %key, "system field rejected");
            return Err(ApiError::BadRequest("invalid_field"));
        }
        let Some(col_type) = entity.col_type(key) else {
            tracing::debug!(entity = entity.table(), field = %key, "unknown field rejected");
            return Err(ApiError::BadRequest("invalid_field"));
        };
        if !col_type.accepts(value) {
            tracing::debug!(entity = entity.table(), field = %key, "mistyped field rejected");
            return Err(ApiError::BadRequest("invalid_field"));
        }
    }
    Ok(())
}
