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

/// Workspace with an owner and one plain member, plus a project of the given
/// visibility created by the owner. Returns (workspace id, project id).
async fn workspace_with_project(
    app: &Router,
    owner_token: &str,
    member_id: Uuid,
    visibility: &str,
) -> Result<(String, String)> {
    let (status, ws) = send(app, "POST", "/workspaces", Some(owner_token), Some(json!({"name": "Team"}))).await?;
    assert_eq!(status, StatusCode::CREATED);
    let ws_id = ws.get("id").and_then(|v| v.as_str()).context("ws id")?.to_string();

    let (status, _) = send(
        app,
        "POST",
        &format!("/workspaces/{ws_id}/members"),
        Some(owner_token),
        Some(json!({"user_id": member_id, "role": "member"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, project) = send(
        app,
        "POST",
        &format!("/workspaces/{ws_id}/projects"),
        Some(owner_token),
        Some(json!({"name": "Site", "visibility": visibility})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = project.get("id").and_then(|v| v.as_str()).context("project id")?.to_string();

    Ok((ws_id, project_id))
}

fn project_role(project: &Value, user_id: Uuid) -> Option<String> {
    project
        .get("roles")?
        .as_array()?
        .iter()
        .find(|r| r.get("userId").and_then(|v| v.as_str()) == Some(user_id.to_string().as_str()))
        .and_then(|r| r.get("role"))
        .and_then(|r| r.as_str())
        .map(str::to_string)
}

#[tokio::test]
async fn opening_a_public_project_enrolls_the_member() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let (owner_token, _) = register(&app, "Owner", "owner@example.com").await?;
    let (b_token, b_id) = register(&app, "Bea", "bea@example.com").await?;

    let (_, project_id) = workspace_with_project(&app, &owner_token, b_id, "public").await?;

    let (status, project) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&b_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project_role(&project, b_id).as_deref(), Some("Member"));

    // the enrollment is persisted, not just reflected in the response
    let raw: String = sqlx::query_scalar("SELECT roles FROM projects WHERE id = ?")
        .bind(&project_id)
        .fetch_one(&pool)
        .await?;
    assert!(raw.contains(&b_id.to_string()));

    // a second open does not duplicate the entry
    let (_, again) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&b_token), None).await?;
    let count = again
        .get("roles")
        .and_then(|r| r.as_array())
        .map(|roles| {
            roles
                .iter()
                .filter(|r| r.get("userId").and_then(|v| v.as_str()) == Some(b_id.to_string().as_str()))
                .count()
        })
        .unwrap_or(0);
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn listing_projects_filters_without_enrolling() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let (owner_token, _) = register(&app, "Owner", "owner@example.com").await?;
    let (b_token, b_id) = register(&app, "Bea", "bea@example.com").await?;

    let (ws_id, public_id) = workspace_with_project(&app, &owner_token, b_id, "public").await?;
    let (status, hidden) = send(
        &app,
        "POST",
        &format!("/workspaces/{ws_id}/projects"),
        Some(&owner_token),
        Some(json!({"name": "Secret", "visibility": "invite-only"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let hidden_id = hidden.get("id").and_then(|v| v.as_str()).context("project id")?.to_string();

    let (status, list) = send(
        &app,
        "GET",
        &format!("/workspaces/{ws_id}/projects"),
        Some(&b_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = list
        .as_array()
        .context("expected array")?
        .iter()
        .filter_map(|p| p.get("id").and_then(|v| v.as_str()))
        .collect();
    assert!(ids.contains(&public_id.as_str()));
    assert!(!ids.contains(&hidden_id.as_str()));

    // the visible project's roles were not mutated by the listing
    let raw: String = sqlx::query_scalar("SELECT roles FROM projects WHERE id = ?")
        .bind(&public_id)
        .fetch_one(&pool)
        .await?;
    assert!(!raw.contains(&b_id.to_string()));

    Ok(())
}

#[tokio::test]
async fn invite_only_projects_admit_admins_and_direct_members() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (owner_token, owner_id) = register(&app, "Owner", "owner@example.com").await?;
    let (b_token, b_id) = register(&app, "Bea", "bea@example.com").await?;

    let (ws_id, project_id) = workspace_with_project(&app, &owner_token, b_id, "invite-only").await?;

    // a plain member is shut out
    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&b_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // a workspace admin gets in and is enrolled as project Admin
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/workspaces/{ws_id}/members/{b_id}"),
        Some(&owner_token),
        Some(json!({"role": "admin"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, project) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&b_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project_role(&project, b_id).as_deref(), Some("Admin"));

    // the creator was enrolled as Owner at creation time
    assert_eq!(project_role(&project, owner_id).as_deref(), Some("Owner"));

    Ok(())
}

#[tokio::test]
async fn direct_enrollment_admits_a_plain_member_to_a_hidden_project() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (owner_token, _) = register(&app, "Owner", "owner@example.com").await?;
    let (b_token, b_id) = register(&app, "Bea", "bea@example.com").await?;

    let (_, project_id) = workspace_with_project(&app, &owner_token, b_id, "invite-only").await?;

    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&b_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the project owner adds bea directly
    let (status, project) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/members"),
        Some(&owner_token),
        Some(json!({"user_id": b_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project_role(&project, b_id).as_deref(), Some("Member"));

    let (status, _) = send(&app, "GET", &format!("/projects/{project_id}"), Some(&b_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    // direct members can work with tasks even in a hidden project
    let (status, task) = send(
        &app,
        "POST",
        &format!("/projects/{project_id}/tasks"),
        Some(&b_token),
        Some(json!({"title": "Write docs"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task.get("status").and_then(|s| s.as_str()), Some("pending"));

    let (status, tasks) = send(
        &app,
        "GET",
        &format!("/projects/{project_id}/tasks"),
        Some(&b_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));

    Ok(())
}
