use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use teamspace::create_app;

async fn setup() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((app, pool, dir))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn register(app: &Router, name: &str, email: &str) -> Result<(String, Uuid)> {
    let payload = json!({"name": name, "email": email, "password": "password123"});
    let (status, v) = send(app, "POST", "/auth/register", None, Some(payload)).await?;
    assert_eq!(status, StatusCode::CREATED, "register failed: {v}");

    let token = v
        .get("token")
        .and_then(|t| t.as_str())
        .context("missing token")?
        .to_string();
    let user_id = v
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|id| id.as_str())
        .context("missing user id")?;
    Ok((token, Uuid::parse_str(user_id)?))
}

fn member_role(workspace: &Value, user_id: Uuid) -> Option<String> {
    workspace
        .get("members")?
        .as_array()?
        .iter()
        .find(|m| m.get("userId").and_then(|v| v.as_str()) == Some(user_id.to_string().as_str()))
        .and_then(|m| m.get("role"))
        .and_then(|r| r.as_str())
        .map(str::to_string)
}

#[tokio::test]
async fn registering_creates_a_personal_workspace() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (token, user_id) = register(&app, "Ada", "ada@example.com").await?;

    let (status, v) = send(&app, "GET", "/workspaces", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let workspaces = v.as_array().context("expected array")?;
    assert_eq!(workspaces.len(), 1);
    let ws = &workspaces[0];
    assert_eq!(ws.get("name").and_then(|n| n.as_str()), Some("Ada's Workspace"));
    assert_eq!(
        ws.get("owner_id").and_then(|o| o.as_str()),
        Some(user_id.to_string().as_str())
    );
    assert_eq!(member_role(ws, user_id).as_deref(), Some("owner"));

    Ok(())
}

#[tokio::test]
async fn membership_mutations_respect_role_rules() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (owner_token, owner_id) = register(&app, "Owner", "owner@example.com").await?;
    let (b_token, b_id) = register(&app, "Bea", "bea@example.com").await?;
    let (c_token, c_id) = register(&app, "Cal", "cal@example.com").await?;

    let (status, ws) = send(
        &app,
        "POST",
        "/workspaces",
        Some(&owner_token),
        Some(json!({"name": "Team"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let ws_id = ws.get("id").and_then(|v| v.as_str()).context("ws id")?.to_string();

    // a stranger cannot even read the workspace
    let (status, _) = send(&app, "GET", &format!("/workspaces/{ws_id}"), Some(&b_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // owner adds bea as a plain member
    let (status, ws) = send(
        &app,
        "POST",
        &format!("/workspaces/{ws_id}/members"),
        Some(&owner_token),
        Some(json!({"user_id": b_id, "role": "member"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(member_role(&ws, b_id).as_deref(), Some("member"));

    // a plain member cannot add anyone
    let (status, _) = send(
        &app,
        "POST",
        &format!("/workspaces/{ws_id}/members"),
        Some(&b_token),
        Some(json!({"user_id": c_id, "role": "member"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // only the owner can promote to admin
    let (status, ws) = send(
        &app,
        "PUT",
        &format!("/workspaces/{ws_id}/members/{b_id}"),
        Some(&owner_token),
        Some(json!({"role": "admin"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(member_role(&ws, b_id).as_deref(), Some("admin"));

    // an admin can add plain members
    let (status, _) = send(
        &app,
        "POST",
        &format!("/workspaces/{ws_id}/members"),
        Some(&b_token),
        Some(json!({"user_id": c_id, "role": "member"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // but an admin cannot grant the admin role
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/workspaces/{ws_id}/members/{c_id}"),
        Some(&b_token),
        Some(json!({"role": "admin"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the owner entry is untouchable
    let (status, _) = send(
        &app,
        "POST",
        &format!("/workspaces/{ws_id}/members"),
        Some(&owner_token),
        Some(json!({"user_id": owner_id, "role": "member"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/workspaces/{ws_id}/members/{owner_id}"),
        Some(&owner_token),
        Some(json!({"role": "admin"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/workspaces/{ws_id}/members/{owner_id}"),
        Some(&b_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // an admin removes a plain member; removal is idempotent
    let (status, ws) = send(
        &app,
        "DELETE",
        &format!("/workspaces/{ws_id}/members/{c_id}"),
        Some(&b_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(member_role(&ws, c_id).is_none());

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/workspaces/{ws_id}/members/{c_id}"),
        Some(&b_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // once removed, access is gone
    let (status, _) = send(&app, "GET", &format!("/workspaces/{ws_id}"), Some(&c_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn legacy_member_entries_are_repaired_on_write() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let (owner_token, owner_id) = register(&app, "Owner", "owner@example.com").await?;
    let (b_token, b_id) = register(&app, "Bea", "bea@example.com").await?;

    // seed a row the old way: members holds a bare id string and the owner
    // entry is missing entirely
    let ws_id = Uuid::new_v4();
    let now = chrono::Utc::now();
    sqlx::query(
        "INSERT INTO workspaces (id, name, owner_id, members, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(ws_id.to_string())
    .bind("Legacy")
    .bind(owner_id.to_string())
    .bind(format!("[\"{b_id}\"]"))
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    // a bare id decodes as a plain member, so bea can read the workspace
    let (status, ws) = send(&app, "GET", &format!("/workspaces/{ws_id}"), Some(&b_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(member_role(&ws, b_id).as_deref(), Some("member"));

    // the owner resolves from owner_id even without a member entry
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/workspaces/{ws_id}/members/{b_id}"),
        Some(&owner_token),
        Some(json!({"role": "admin"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // the write normalized the stored column: object entries only, owner
    // entry restored
    let raw: String = sqlx::query_scalar("SELECT members FROM workspaces WHERE id = ?")
        .bind(ws_id.to_string())
        .fetch_one(&pool)
        .await?;
    let members: Vec<Value> = serde_json::from_str(&raw)?;
    assert!(members.iter().all(|m| m.is_object()));

    let stored = Value::Array(members);
    let ws = json!({"members": stored});
    assert_eq!(member_role(&ws, owner_id).as_deref(), Some("owner"));
    assert_eq!(member_role(&ws, b_id).as_deref(), Some("admin"));

    Ok(())
}
