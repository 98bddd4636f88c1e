// lib.rs - Dealboard admin guard service
//
// Everything privileged in the Dealboard backend funnels through this
// crate: step-up elevation, impersonation, entity administration,
// moderation, the alert queue and the audit trail behind them all.

pub mod audit;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod push;
pub mod store;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::push::PushRelay;
use crate::store::AdminStore;

/// Shared application state: the store seam plus the outbound relay.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AdminStore>,
    pub push: PushRelay,
}

/// Build the full router. The envelope rewrite sits closest to the
/// routes; CORS decorates whatever comes back out, rewrites included.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .route("/flags/eval", post(handlers::public::flags::eval))
        // Guarded
        .merge(admin_routes())
        // Global middleware
        .layer(axum::middleware::map_response(
            middleware::response::error_envelope,
        ))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn admin_routes() -> Router<AppState> {
    use handlers::admin::{alerts, audit, crud, elevate, impersonate, moderation, push};

    Router::new()
        .route("/api/admin/elevate", post(elevate::elevate))
        .route("/api/admin/impersonate", post(impersonate::impersonate))
        .route("/api/admin/crud", post(crud::crud))
        .route("/api/admin/users/ban", post(moderation::ban))
        .route("/api/admin/users/unban", post(moderation::unban))
        .route("/api/admin/users/verify", post(moderation::verify))
        .route("/api/admin/users/role", post(moderation::set_role))
        .route("/api/admin/alerts/queue", post(alerts::queue))
        .route("/api/admin/push/send", post(push::send))
        .route("/api/admin/audit", get(audit::list))
}
