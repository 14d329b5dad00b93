use anyhow::{ensure, Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use practiceguard::create_app;

async fn setup_app() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
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
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = builder.body(match payload {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    })?;

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

async fn register(app: &Router, name: &str, email: &str, practice: &str) -> Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "name": name,
            "email": email,
            "password": "password123",
            "practice_name": practice
        })),
    )
    .await?;
    ensure!(status == StatusCode::CREATED, "register failed: {} {}", status, body);
    Ok(body["token"].as_str().context("missing token")?.to_string())
}

/// Sets up one practice with an owner and a nurse. Returns
/// (owner_token, nurse_token, nurse_user_id).
async fn practice_with_nurse(app: &Router) -> Result<(String, String, String)> {
    let owner = register(app, "Ada", "ada@example.com", "Lovelace Dental").await?;
    register(app, "Nia", "nia@example.com", "Nia Own Practice").await?;

    let (status, body) = send(
        app,
        "POST",
        "/members",
        Some(&owner),
        Some(json!({"email": "nia@example.com", "role": "nurse"})),
    )
    .await?;
    ensure!(status == StatusCode::CREATED, "add member failed: {} {}", status, body);
    let nurse_id = body["user_id"].as_str().context("missing user id")?.to_string();

    let (_, me) = send(app, "GET", "/auth/me", Some(&owner), None).await?;
    let org = me["active_organization_id"].as_str().context("org")?;

    let (status, login) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "nia@example.com", "password": "password123"})),
    )
    .await?;
    ensure!(status == StatusCode::OK, "login failed: {}", status);

    let (status, selected) = send(
        app,
        "POST",
        "/auth/select-practice",
        Some(login["token"].as_str().context("token")?),
        Some(json!({"organization_id": org})),
    )
    .await?;
    ensure!(status == StatusCode::OK, "select failed: {}", status);
    let nurse = selected["token"].as_str().context("token")?.to_string();

    Ok((owner, nurse, nurse_id))
}

#[tokio::test]
async fn nurse_sees_only_assigned_tasks() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let (owner, nurse, nurse_id) = practice_with_nurse(&app).await?;

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(&owner),
        Some(json!({"title": "Unassigned audit"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(&owner),
        Some(json!({"title": "Sterilizer check", "assigned_to": nurse_id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, owner_view) = send(&app, "GET", "/tasks", Some(&owner), None).await?;
    assert_eq!(owner_view.as_array().map(Vec::len), Some(2));

    let (_, nurse_view) = send(&app, "GET", "/tasks", Some(&nurse), None).await?;
    let titles: Vec<&str> = nurse_view
        .as_array()
        .context("array")?
        .iter()
        .filter_map(|t| t["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Sterilizer check"]);

    Ok(())
}

#[tokio::test]
async fn nurse_completes_assigned_task_but_not_others() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let (owner, nurse, nurse_id) = practice_with_nurse(&app).await?;

    let (_, unassigned) = send(
        &app,
        "POST",
        "/tasks",
        Some(&owner),
        Some(json!({"title": "Unassigned audit"})),
    )
    .await?;
    let unassigned_id = unassigned["id"].as_str().context("id")?;

    let (_, assigned) = send(
        &app,
        "POST",
        "/tasks",
        Some(&owner),
        Some(json!({"title": "Sterilizer check", "assigned_to": nurse_id})),
    )
    .await?;
    let assigned_id = assigned["id"].as_str().context("id")?;

    // A task assigned to someone else reads as nonexistent to the nurse.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/tasks/{}/complete", unassigned_id),
        Some(&nurse),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, completed) = send(
        &app,
        "POST",
        &format!("/tasks/{}/complete", assigned_id),
        Some(&nurse),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert!(completed["completed_at"].is_string());
    assert_eq!(completed["completed_by"].as_str(), Some(nurse_id.as_str()));

    Ok(())
}

#[tokio::test]
async fn completing_twice_conflicts() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let owner = register(&app, "Ada", "ada@example.com", "Lovelace Dental").await?;

    let (_, task) = send(
        &app,
        "POST",
        "/tasks",
        Some(&owner),
        Some(json!({"title": "Legionella risk assessment"})),
    )
    .await?;
    let id = task["id"].as_str().context("id")?;

    let (status, _) = send(&app, "POST", &format!("/tasks/{}/complete", id), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", &format!("/tasks/{}/complete", id), Some(&owner), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    Ok(())
}

#[tokio::test]
async fn nurse_cannot_create_or_delete_tasks() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let (owner, nurse, _) = practice_with_nurse(&app).await?;

    let (status, body) = send(
        &app,
        "POST",
        "/tasks",
        Some(&nurse),
        Some(json!({"title": "Nurse-created"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (_, task) = send(
        &app,
        "POST",
        "/tasks",
        Some(&owner),
        Some(json!({"title": "Owner-created"})),
    )
    .await?;
    let id = task["id"].as_str().context("id")?;

    let (status, _) = send(&app, "DELETE", &format!("/tasks/{}", id), Some(&nurse), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn assignee_must_belong_to_the_practice() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let owner = register(&app, "Ada", "ada@example.com", "Lovelace Dental").await?;

    let (status, body) = send(
        &app,
        "POST",
        "/tasks",
        Some(&owner),
        Some(json!({"title": "Orphan assignment", "assigned_to": Uuid::new_v4()})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    Ok(())
}
