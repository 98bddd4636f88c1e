// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::store::StoreError;

/// Elevation sessions that are presented but no longer valid get their own
/// status so clients can prompt "re-elevate" instead of "log in again".
/// Non-standard but inside the range `StatusCode` accepts.
pub const ELEVATION_EXPIRED_STATUS: u16 = 440;

/// HTTP API error with the fixed `{"error": "<code>"}` wire envelope.
///
/// Codes are deliberately generic: authentication and authorization
/// failures never reveal whether a user exists or which check failed,
/// and database detail stays in the server log.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request, code varies per case
    BadRequest(&'static str),

    // 401 Unauthorized
    Unauthorized,

    // 403 Forbidden
    Forbidden,
    ImpersonationInvalid,

    // 404 Not Found
    NotFound,

    // 405 Method Not Allowed
    MethodNotAllowed,

    // 428 Precondition Required: no step-up token presented at all
    ElevationRequired,

    // 440: step-up token presented but unknown or past its window
    ElevationExpired,

    // 500 Internal Server Error
    Db(String),
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::Forbidden => 403,
            ApiError::ImpersonationInvalid => 403,
            ApiError::NotFound => 404,
            ApiError::MethodNotAllowed => 405,
            ApiError::ElevationRequired => 428,
            ApiError::ElevationExpired => ELEVATION_EXPIRED_STATUS,
            ApiError::Db(_) => 500,
            ApiError::Internal(_) => 500,
        }
    }

    /// Get the wire code clients switch on
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(code) => code,
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::ImpersonationInvalid => "impersonation_invalid",
            ApiError::NotFound => "not_found",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::ElevationRequired => "elevation_required",
            ApiError::ElevationExpired => "elevation_expired",
            ApiError::Db(_) => "db_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({ "error": self.code() })
    }
}

// Convert other error types to ApiError
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            other => {
                // Log the real error but return a generic code
                tracing::error!("store error: {}", other);
                ApiError::Db(other.to_string())
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Db(detail) => write!(f, "{}: {}", self.code(), detail),
            ApiError::Internal(detail) => write!(f, "{}: {}", self.code(), detail),
            _ => write!(f, "{}", self.code()),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
