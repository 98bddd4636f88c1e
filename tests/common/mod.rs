// Shared integration-test harness. One api server plus one stub push
// relay serve every test in a binary; state is scoped per binary
// because each test file is its own process.
#![allow(dead_code)]

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use uuid::Uuid;

use dealboard_admin_api::auth::{generate_jwt, Claims};
use dealboard_admin_api::push::PushRelay;
use dealboard_admin_api::store::memory::MemoryStore;
use dealboard_admin_api::{app, AppState};

static SERVER: OnceCell<TestServer> = OnceCell::const_new();

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    SERVER.get_or_try_init(TestServer::spawn).await
}

impl TestServer {
    async fn spawn() -> Result<TestServer> {
        let api_port = portpicker::pick_unused_port().context("no free port for api")?;
        let relay_port = portpicker::pick_unused_port().context("no free port for relay")?;

        // Bind synchronously so both servers can move to a runtime that
        // outlives the per-test runtimes tokio::test hands out.
        let api_listener = StdTcpListener::bind(("127.0.0.1", api_port))?;
        api_listener.set_nonblocking(true)?;
        let relay_listener = StdTcpListener::bind(("127.0.0.1", relay_port))?;
        relay_listener.set_nonblocking(true)?;

        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            store: store.clone(),
            push: PushRelay::new(&format!("http://127.0.0.1:{}", relay_port)),
        };

        thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().expect("test server runtime");
            rt.block_on(async move {
                let relay = tokio::net::TcpListener::from_std(relay_listener)
                    .expect("relay listener");
                tokio::spawn(async move {
                    let _ = axum::serve(relay, relay_stub()).await;
                });

                let api = tokio::net::TcpListener::from_std(api_listener)
                    .expect("api listener");
                let _ = axum::serve(api, app(state)).await;
            });
        });

        let base_url = format!("http://127.0.0.1:{}", api_port);
        wait_ready(&base_url).await?;
        Ok(TestServer { base_url, store })
    }
}

async fn wait_ready(base_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(res) = client.get(format!("{}/health", base_url)).send().await {
            if res.status().is_success() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("test server never became ready at {}", base_url)
}

/// Stand-in for the push relay. Tokens pick their own fate: a batch
/// holding any token starting with "boom" fails wholesale, tokens
/// starting with "dead" come back as unregistered devices, the rest
/// are accepted.
fn relay_stub() -> Router {
    Router::new().route("/send", post(relay_send))
}

async fn relay_send(Json(body): Json<Value>) -> Response {
    let batch = body.as_array().cloned().unwrap_or_default();
    let exploding = batch.iter().any(|message| {
        message["to"]
            .as_str()
            .map(|token| token.starts_with("boom"))
            .unwrap_or(false)
    });
    if exploding {
        return (StatusCode::INTERNAL_SERVER_ERROR, "relay exploded").into_response();
    }

    let tickets: Vec<Value> = batch
        .iter()
        .map(|message| {
            let token = message["to"].as_str().unwrap_or_default();
            if token.starts_with("dead") {
                json!({"status": "error", "error": "DeviceNotRegistered"})
            } else {
                json!({"status": "ok"})
            }
        })
        .collect();
    Json(json!({"data": tickets})).into_response()
}

pub fn bearer_for(user_id: Uuid, email: &str) -> String {
    generate_jwt(Claims::new(user_id, email)).expect("signing test jwt")
}

pub async fn seed_admin(server: &TestServer) -> (Uuid, String) {
    seed_with_role(server, "admin").await
}

pub async fn seed_super_admin(server: &TestServer) -> (Uuid, String) {
    seed_with_role(server, "super_admin").await
}

pub async fn seed_member(server: &TestServer) -> (Uuid, String) {
    seed_with_role(server, "user").await
}

async fn seed_with_role(server: &TestServer, role: &str) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let email = format!("{}-{}@dealboard.test", role.replace('_', "-"), id.simple());
    server.store.seed_user(id, &email, role).await;
    (id, bearer_for(id, &email))
}

pub async fn elevate(
    client: &reqwest::Client,
    server: &TestServer,
    bearer: &str,
) -> Result<String> {
    elevate_with_ttl(client, server, bearer, None).await
}

pub async fn elevate_with_ttl(
    client: &reqwest::Client,
    server: &TestServer,
    bearer: &str,
    ttl_minutes: Option<i64>,
) -> Result<String> {
    let body = match ttl_minutes {
        Some(ttl) => json!({"ttl_minutes": ttl}),
        None => json!({}),
    };
    let res = client
        .post(format!("{}/api/admin/elevate", server.base_url))
        .bearer_auth(bearer)
        .json(&body)
        .send()
        .await?;
    anyhow::ensure!(
        res.status().is_success(),
        "elevation failed with {}",
        res.status()
    );
    let body = res.json::<Value>().await?;
    body["token"]
        .as_str()
        .map(str::to_owned)
        .context("elevation response carried no token")
}
