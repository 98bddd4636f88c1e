// main.rs - server entrypoint

use std::sync::Arc;

use anyhow::Context;

use dealboard_admin_api::config;
use dealboard_admin_api::push::PushRelay;
use dealboard_admin_api::store::postgres::PgStore;
use dealboard_admin_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the config singleton reads the environment
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!(environment = ?config.environment, "starting dealboard-admin-api");

    let store = PgStore::connect().await.context("store bootstrap failed")?;
    let state = AppState {
        store: Arc::new(store),
        push: PushRelay::from_config(),
    };

    // Allow tests or deployments to override port via env
    let port = std::env::var("ADMIN_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    println!("🚀 dealboard-admin-api listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server")?;
    Ok(())
}
