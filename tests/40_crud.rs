mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use dealboard_admin_api::guard::ELEVATION_HEADER;

async fn crud(
    client: &reqwest::Client,
    server: &common::TestServer,
    bearer: &str,
    elevation: Option<&str>,
    body: Value,
) -> Result<reqwest::Response> {
    let mut req = client
        .post(format!("{}/api/admin/crud", server.base_url))
        .bearer_auth(bearer)
        .json(&body);
    if let Some(token) = elevation {
        req = req.header(ELEVATION_HEADER, token);
    }
    Ok(req.send().await?)
}

#[tokio::test]
async fn entity_names_resolve_against_the_registry_only() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;

    for entity in [
        "users; drop table users",
        "../secrets",
        "users",
        "Deals",
        "deals--",
        "",
    ] {
        let res = crud(
            &client,
            server,
            &bearer,
            None,
            json!({"op": "list", "entity": entity}),
        )
        .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "entity {:?}", entity);
        assert_eq!(
            res.json::<Value>().await?,
            json!({"error": "unknown_entity"}),
            "entity {:?}",
            entity
        );
    }

    // Entity absent entirely
    let res = crud(&client, server, &bearer, None, json!({"op": "list"})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "unknown_entity"}));
    Ok(())
}

#[tokio::test]
async fn op_must_be_a_known_verb() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;

    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "truncate", "entity": "deals"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "invalid_op"}));

    let res = crud(&client, server, &bearer, None, json!({"entity": "deals"})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "invalid_op"}));
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;

    let res = client
        .post(format!("{}/api/admin/crud", server.base_url))
        .bearer_auth(&bearer)
        .header("content-type", "application/json")
        .body("{ \"op\": \"list\", ")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "invalid_json"}));
    Ok(())
}

#[tokio::test]
async fn write_payloads_are_allow_listed() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    let cases = [
        // System columns stay server-owned
        (json!({"id": Uuid::new_v4().to_string()}), "invalid_field"),
        (json!({"created_at": "2026-01-01T00:00:00Z"}), "invalid_field"),
        // Columns outside the entity's allow-list
        (json!({"role": "super_admin"}), "invalid_field"),
        // Right column, wrong type
        (json!({"price_cents": "free"}), "invalid_field"),
        (json!({}), "missing_data"),
    ];
    for (data, code) in cases {
        let res = crud(
            &client,
            server,
            &bearer,
            Some(&elevation),
            json!({"op": "create", "entity": "deals", "data": data}),
        )
        .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "data {}", data);
        assert_eq!(res.json::<Value>().await?, json!({"error": code}), "data {}", data);
    }

    // No data key at all
    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "create", "entity": "deals"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "missing_data"}));
    Ok(())
}

#[tokio::test]
async fn create_get_update_round_trip() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (admin_id, bearer) = common::seed_admin(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    let payload = json!({
        "title": "mechanical keyboard, 40% off",
        "description": "hot-swappable switches",
        "price_cents": 8999,
        "status": "published"
    });
    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "create", "entity": "deals", "data": payload}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["ok"], true);
    let id = body["item"]["id"].as_str().unwrap().to_string();
    assert!(body["item"]["created_at"].is_string());

    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "get", "entity": "deals", "id": id}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let fetched = res.json::<Value>().await?;
    assert_eq!(fetched["item"]["title"], payload["title"]);
    assert_eq!(fetched["item"]["price_cents"], payload["price_cents"]);

    let update = json!({"price_cents": 7999, "status": "expired"});
    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "update", "entity": "deals", "id": id, "data": update}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["item"]["price_cents"], 7999);
    assert_eq!(body["item"]["title"], payload["title"]);

    // Updating a row that never existed is a 404, not an upsert
    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({
            "op": "update",
            "entity": "deals",
            "id": Uuid::new_v4().to_string(),
            "data": {"status": "expired"}
        }),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let mine: Vec<_> = server
        .store
        .audit_entries()
        .await
        .into_iter()
        .filter(|e| e.actor_id == admin_id && e.target_id.as_deref() == Some(id.as_str()))
        .collect();
    let creates: Vec<_> = mine.iter().filter(|e| e.action == "admin.crud.create").collect();
    let updates: Vec<_> = mine.iter().filter(|e| e.action == "admin.crud.update").collect();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].target_type.as_deref(), Some("deals"));
    assert_eq!(creates[0].diff, Some(payload));
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].diff, Some(update));
    Ok(())
}

#[tokio::test]
async fn id_validation_comes_before_lookup() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;

    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "get", "entity": "deals"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "missing_id"}));

    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "get", "entity": "deals", "id": "not-a-uuid"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "invalid_id"}));

    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "get", "entity": "deals", "id": Uuid::new_v4().to_string()}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_defaults_to_tombstoning() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    // Comments keep their rows so removed content stays reviewable
    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "create", "entity": "comments", "data": {"body": "obvious spam"}}),
    )
    .await?;
    let comment_id = res.json::<Value>().await?["item"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "delete", "entity": "comments", "id": comment_id}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body, json!({"ok": true, "mode": "soft"}));

    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "get", "entity": "comments", "id": comment_id}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.json::<Value>().await?["item"]["deleted_at"].is_string());

    // Asking for a hard delete removes the tombstoned row for good
    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "delete", "entity": "comments", "id": comment_id, "hard_delete": true}),
    )
    .await?;
    assert_eq!(res.json::<Value>().await?, json!({"ok": true, "mode": "hard"}));

    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "get", "entity": "comments", "id": comment_id}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Reports have no deleted_at column; delete is always hard
    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "create", "entity": "reports", "data": {"reason": "expired deal"}}),
    )
    .await?;
    let report_id = res.json::<Value>().await?["item"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "delete", "entity": "reports", "id": report_id}),
    )
    .await?;
    assert_eq!(res.json::<Value>().await?, json!({"ok": true, "mode": "hard"}));

    let res = crud(
        &client,
        server,
        &bearer,
        Some(&elevation),
        json!({"op": "delete", "entity": "reports", "id": report_id}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn pages_walk_descending_with_filter() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let (_, bearer) = common::seed_admin(server).await;
    let elevation = common::elevate(&client, server, &bearer).await?;

    // Categories are only written by this test; the filter prefix keeps
    // the assertions stable regardless
    for suffix in ["a", "b", "c", "d", "e"] {
        let res = crud(
            &client,
            server,
            &bearer,
            Some(&elevation),
            json!({
                "op": "create",
                "entity": "categories",
                "data": {"name": format!("pagtest-{}", suffix), "slug": format!("pagtest-{}", suffix)}
            }),
        )
        .await?;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let list = |cursor: Option<String>| {
        let mut body = json!({"op": "list", "entity": "categories", "limit": 2, "filter": "pagtest-"});
        if let Some(cursor) = cursor {
            body["cursor"] = json!(cursor);
        }
        crud(&client, server, &bearer, None, body)
    };

    let names = |page: &Value| -> Vec<String> {
        page["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap().to_string())
            .collect()
    };

    // Newest first, two per page
    let page = list(None).await?.json::<Value>().await?;
    assert_eq!(names(&page), vec!["pagtest-e", "pagtest-d"]);
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let page = list(Some(cursor)).await?.json::<Value>().await?;
    assert_eq!(names(&page), vec!["pagtest-c", "pagtest-b"]);
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let page = list(Some(cursor)).await?.json::<Value>().await?;
    assert_eq!(names(&page), vec!["pagtest-a"]);
    assert!(page["next_cursor"].is_null());

    // Filters match case-insensitively
    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "list", "entity": "categories", "filter": "PAGTEST-B"}),
    )
    .await?;
    let page = res.json::<Value>().await?;
    assert_eq!(names(&page), vec!["pagtest-b"]);

    // A cursor that is not a timestamp is rejected before the query
    let res = crud(
        &client,
        server,
        &bearer,
        None,
        json!({"op": "list", "entity": "categories", "cursor": "yesterday"}),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?, json!({"error": "invalid_cursor"}));
    Ok(())
}
