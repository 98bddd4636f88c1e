use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;

/// Bearer-token claims. Identity only: the token proves who is calling,
/// never what they may do. Roles live in the accounts table and are
/// resolved fresh on every request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email: email.into(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for JwtError {}

/// Sign a token for the given claims. Session issuance belongs to the
/// auth provider in front of this service; this exists for local
/// tooling and the test harness.
pub fn generate_jwt(claims: Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, &claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Resolve the calling user id from the Authorization header.
///
/// Any failure, from a missing header to a bad signature, collapses to
/// a plain `unauthorized`; the reason goes to the log, not the caller.
pub fn verify_bearer(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let token = extract_bearer(headers)?;
    let claims = validate_jwt(&token)?;
    Ok(claims.sub)
}

/// Extract the raw JWT from the Authorization header
fn extract_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let auth_header = headers.get("authorization").ok_or(ApiError::Unauthorized)?;

    let auth_str = auth_header.to_str().map_err(|_| ApiError::Unauthorized)?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Validate the JWT signature and expiry, returning its claims
fn validate_jwt(token: &str) -> Result<Claims, ApiError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        tracing::error!("JWT secret not configured; rejecting all bearers");
        return Err(ApiError::Unauthorized);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!("bearer rejected: {}", e);
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}
