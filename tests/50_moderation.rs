mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use dealboard_admin_api::guard::ELEVATION_HEADER;

async fn moderate(
    client: &reqwest::Client,
    server: &common::TestServer,
    bearer: &str,
    elevation: &str,
    endpoint: &str,
    body: Value,
) -> Result<reqwest::Response> {
    Ok(client
        .post(format!("{}/api/admin/users/{}", server.base_url, endpoint))
        .bearer_auth(bearer)
        .header(ELEVATION_HEADER, elevation)
        .json(&body)
        .send()
        .await?)
}

#[tokio::test]
async fn ban_and_unban_round_trip() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (admin_id, bearer) = common::seed_admin(server).await;
    let (member_id, _) = common::seed_member(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "ban",
        json!({"user_id": member_id.to_string(), "reason": "fraudulent listings"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["ok"], true);
    assert!(body["user"]["banned_at"].is_string());
    assert_eq!(body["user"]["ban_reason"], "fraudulent listings");

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "unban",
        json!({"user_id": member_id.to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert!(body["user"]["banned_at"].is_null());

    let mine: Vec<_> = server
        .store
        .audit_entries()
        .await
        .into_iter()
        .filter(|e| {
            e.actor_id == admin_id && e.target_id.as_deref() == Some(member_id.to_string().as_str())
        })
        .collect();
    let actions: Vec<&str> = mine.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["admin.user.ban", "admin.user.unban"]);
    assert_eq!(
        mine[0].diff,
        Some(json!({"banned": true, "reason": "fraudulent listings"}))
    );
    assert_eq!(mine[1].diff, Some(json!({"banned": false})));
    Ok(())
}

#[tokio::test]
async fn banning_yourself_is_refused() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (admin_id, bearer) = common::seed_admin(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "ban",
        json!({"user_id": admin_id.to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await?,
        json!({"error": "cannot_ban_self"})
    );
    Ok(())
}

#[tokio::test]
async fn privileged_targets_take_a_super_admin() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, admin_bearer) = common::seed_admin(server).await;
    let (super_id, super_bearer) = common::seed_super_admin(server).await;
    let (peer_admin_id, _) = common::seed_admin(server).await;

    let admin_elevation = common::elevate(&client, server, &admin_bearer).await?;
    let super_elevation = common::elevate(&client, server, &super_bearer).await?;

    // A plain admin cannot ban another admin
    let res = moderate(
        &client,
        server,
        &admin_bearer,
        &admin_elevation,
        "ban",
        json!({"user_id": peer_admin_id.to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await?, json!({"error": "forbidden"}));

    // A super admin can
    let res = moderate(
        &client,
        server,
        &super_bearer,
        &super_elevation,
        "ban",
        json!({"user_id": peer_admin_id.to_string(), "reason": "compromised account"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // Unban follows the same line, and super admins are not above it
    let res = moderate(
        &client,
        server,
        &admin_bearer,
        &admin_elevation,
        "unban",
        json!({"user_id": super_id.to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn verification_is_a_plain_admin_action() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;
    let (member_id, _) = common::seed_member(server).await;
    let (peer_admin_id, _) = common::seed_admin(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    // Default grants the badge
    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "verify",
        json!({"user_id": member_id.to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["user"]["verified"], true);

    // Explicit false strips it again
    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "verify",
        json!({"user_id": member_id.to_string(), "verified": false}),
    )
    .await?;
    assert_eq!(res.json::<Value>().await?["user"]["verified"], false);

    // The badge is cosmetic; no super_admin gate even for peers
    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "verify",
        json!({"user_id": peer_admin_id.to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn roles_store_their_canonical_spelling() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (admin_id, bearer) = common::seed_admin(server).await;
    let (member_id, _) = common::seed_member(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "role",
        json!({"user_id": member_id.to_string(), "role": "Moderator"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["user"]["role"], "moderator");

    let change: Vec<_> = server
        .store
        .audit_entries()
        .await
        .into_iter()
        .filter(|e| e.actor_id == admin_id && e.action == "admin.user.role_change")
        .collect();
    assert_eq!(change.len(), 1);
    assert_eq!(change[0].diff, Some(json!({"from": "user", "to": "moderator"})));
    Ok(())
}

#[tokio::test]
async fn granting_privilege_takes_a_super_admin() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, admin_bearer) = common::seed_admin(server).await;
    let (_, super_bearer) = common::seed_super_admin(server).await;
    let (member_id, _) = common::seed_member(server).await;

    let admin_elevation = common::elevate(&client, server, &admin_bearer).await?;
    let super_elevation = common::elevate(&client, server, &super_bearer).await?;

    let res = moderate(
        &client,
        server,
        &admin_bearer,
        &admin_elevation,
        "role",
        json!({"user_id": member_id.to_string(), "role": "admin"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Variant spelling lands as the canonical one
    let res = moderate(
        &client,
        server,
        &super_bearer,
        &super_elevation,
        "role",
        json!({"user_id": member_id.to_string(), "role": "SUPER-ADMIN"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["user"]["role"], "super_admin");

    // Demoting the now-privileged account is also super_admin territory
    let res = moderate(
        &client,
        server,
        &admin_bearer,
        &admin_elevation,
        "role",
        json!({"user_id": member_id.to_string(), "role": "user"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = moderate(
        &client,
        server,
        &super_bearer,
        &super_elevation,
        "role",
        json!({"user_id": member_id.to_string(), "role": "user"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["user"]["role"], "user");
    Ok(())
}

#[tokio::test]
async fn target_and_role_validation() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;
    let (member_id, _) = common::seed_member(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    let res = moderate(&client, server, &bearer, &elevation, "ban", json!({})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "missing_user_id"}));

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "ban",
        json!({"user_id": 42}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "missing_user_id"}));

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "ban",
        json!({"user_id": "not-a-uuid"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "invalid_user_id"}));

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "ban",
        json!({"user_id": Uuid::new_v4().to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = moderate(
        &client,
        server,
        &bearer,
        &elevation,
        "role",
        json!({"user_id": member_id.to_string(), "role": "owner"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "invalid_role"}));
    Ok(())
}

#[tokio::test]
async fn moderation_sits_behind_elevation() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;
    let (member_id, _) = common::seed_member(server).await;

    let res = client
        .post(format!("{}/api/admin/users/verify", server.base_url))
        .bearer_auth(&bearer)
        .json(&json!({"user_id": member_id.to_string()}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::from_u16(428)?);
    assert_eq!(
        res.json::<Value>().await?,
        json!({"error": "elevation_required"})
    );
    Ok(())
}
