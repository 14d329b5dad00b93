use anyhow::{ensure, Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

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

async fn manager_in_practice(app: &Router, owner: &str) -> Result<String> {
    register(app, "Mia", "mia@example.com", "Mia Own Practice").await?;

    let (status, _) = send(
        app,
        "POST",
        "/members",
        Some(owner),
        Some(json!({"email": "mia@example.com", "role": "manager"})),
    )
    .await?;
    ensure!(status == StatusCode::CREATED, "add member failed: {}", status);

    let (_, me) = send(app, "GET", "/auth/me", Some(owner), None).await?;
    let org = me["active_organization_id"].as_str().context("org")?;

    let (_, login) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "mia@example.com", "password": "password123"})),
    )
    .await?;
    let (status, selected) = send(
        app,
        "POST",
        "/auth/select-practice",
        Some(login["token"].as_str().context("token")?),
        Some(json!({"organization_id": org})),
    )
    .await?;
    ensure!(status == StatusCode::OK, "select failed: {}", status);
    Ok(selected["token"].as_str().context("token")?.to_string())
}

#[tokio::test]
async fn owner_changes_subscription_tier() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let owner = register(&app, "Ada", "ada@example.com", "Lovelace Dental").await?;

    let (status, practice) = send(
        &app,
        "PUT",
        "/practice/billing",
        Some(&owner),
        Some(json!({"subscription_tier": "premium"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(practice["subscription_tier"], "premium");

    Ok(())
}

#[tokio::test]
async fn manager_cannot_touch_billing_or_reminders() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let owner = register(&app, "Ada", "ada@example.com", "Lovelace Dental").await?;
    let manager = manager_in_practice(&app, &owner).await?;

    let (status, body) = send(
        &app,
        "PUT",
        "/practice/billing",
        Some(&manager),
        Some(json!({"subscription_tier": "premium"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let message = body["message"].as_str().context("message")?;
    assert!(message.contains("manage-billing"), "got: {}", message);

    let (status, _) = send(
        &app,
        "PUT",
        "/practice/reminders",
        Some(&manager),
        Some(json!({"reminder_frequency": "daily"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn unknown_tier_and_frequency_are_rejected() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let owner = register(&app, "Ada", "ada@example.com", "Lovelace Dental").await?;

    let (status, body) = send(
        &app,
        "PUT",
        "/practice/billing",
        Some(&owner),
        Some(json!({"subscription_tier": "platinum"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = send(
        &app,
        "PUT",
        "/practice/reminders",
        Some(&owner),
        Some(json!({"reminder_frequency": "hourly"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn missing_practice_row_is_an_internal_error() -> Result<()> {
    let (app, pool, _dir) = setup_app().await?;
    let owner = register(&app, "Ada", "ada@example.com", "Lovelace Dental").await?;

    // Corrupt the tenant: the membership survives but its practice row is
    // gone. An integrity violation, not an auth outcome, and the body must
    // stay generic.
    sqlx::query("DELETE FROM practices").execute(&pool).await?;

    let (status, body) = send(
        &app,
        "PUT",
        "/practice/billing",
        Some(&owner),
        Some(json!({"subscription_tier": "premium"})),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal");
    assert_eq!(body["message"], "internal server error");

    Ok(())
}

#[tokio::test]
async fn owner_changes_reminder_frequency() -> Result<()> {
    let (app, _pool, _dir) = setup_app().await?;
    let owner = register(&app, "Ada", "ada@example.com", "Lovelace Dental").await?;

    let (status, practice) = send(
        &app,
        "PUT",
        "/practice/reminders",
        Some(&owner),
        Some(json!({"reminder_frequency": "daily"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(practice["reminder_frequency"], "daily");

    Ok(())
}
