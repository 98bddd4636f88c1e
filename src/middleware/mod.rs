// middleware/mod.rs

pub mod response;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::guard::{ELEVATION_HEADER, IMPERSONATE_AS_HEADER, IMPERSONATE_TOKEN_HEADER};

/// Cross-origin policy for the admin dashboard. The origin stays open,
/// but every custom header must be named here: a header missing from
/// the allow-list is stripped by the browser preflight, and an admin
/// call without its elevation header degrades to a 428.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(ELEVATION_HEADER),
            HeaderName::from_static(IMPERSONATE_AS_HEADER),
            HeaderName::from_static(IMPERSONATE_TOKEN_HEADER),
        ])
}
