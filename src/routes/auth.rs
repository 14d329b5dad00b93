use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthSession;
use crate::models::practice::Practice;
use crate::models::user::{AuthResponse, DbUser, LoginRequest, RegisterRequest, User};
use crate::utils::{hash_password, slugify, utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MembershipSummary {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub memberships: Vec<MembershipSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectPracticeRequest {
    pub organization_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User and practice registered", body = AuthResponse),
        (status = 400, description = "Practice name missing or unusable"),
        (status = 409, description = "Email or practice name already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    ensure_email_available(&state.pool, &payload.email).await?;

    if payload.practice_name.trim().is_empty() {
        return Err(AppError::bad_request("practice name is required"));
    }
    let slug = slugify(&payload.practice_name);
    if slug.is_empty() {
        return Err(AppError::bad_request(
            "practice name must contain letters or numbers",
        ));
    }
    ensure_slug_available(&state.pool, &slug).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();
    let organization_id = Uuid::new_v4();
    let practice_id = Uuid::new_v4();
    let country_code = payload
        .country_code
        .clone()
        .unwrap_or_else(|| "GB".to_string());

    // User, organization, owner membership, and practice attributes are
    // created atomically: there is no state where a tenant exists without
    // its practice record or without an owner.
    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO organizations (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(organization_id.to_string())
    .bind(&payload.practice_name)
    .bind(&slug)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO members (user_id, organization_id, role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(organization_id.to_string())
    .bind(Role::Owner.as_str())
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO practices (id, organization_id, country_code, subscription_tier, reminder_frequency, created_at, updated_at) VALUES (?, ?, ?, 'trial', 'weekly', ?, ?)",
    )
    .bind(practice_id.to_string())
    .bind(organization_id.to_string())
    .bind(&country_code)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let user = fetch_user_by_id(&state.pool, user_id).await?;
    // The freshly created practice becomes the caller's active one.
    let token = state.jwt.encode(user.id, Some(organization_id))?;

    log_activity(
        &state.event_bus,
        "registered",
        Some(user.id),
        Some(practice_id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );
    let practice = Practice {
        id: practice_id,
        organization_id,
        country_code,
        subscription_tier: "trial".to_string(),
        reminder_frequency: "weekly".to_string(),
        created_at: now,
        updated_at: now,
    };
    log_activity(
        &state.event_bus,
        "created",
        Some(user.id),
        Some(practice_id),
        &practice,
        None,
        None,
    );

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthenticated("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthenticated("invalid credentials"));
    }

    let user: User = db_user.try_into()?;

    // A sole membership becomes the active practice right away; callers
    // with several practices must select one explicitly.
    let org_ids: Vec<String> =
        sqlx::query_scalar("SELECT organization_id FROM members WHERE user_id = ?")
            .bind(user.id.to_string())
            .fetch_all(&state.pool)
            .await?;
    let active_org = match org_ids.as_slice() {
        [only] => Some(
            Uuid::parse_str(only)
                .map_err(|_| AppError::internal("invalid organization id in members table"))?,
        ),
        _ => None,
    };

    let token = state.jwt.encode(user.id, active_org)?;

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user with memberships", body = MeResponse)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, session: AuthSession) -> AppResult<Json<MeResponse>> {
    let user = fetch_user_by_id(&state.pool, session.user_id).await?;

    let rows = sqlx::query_as::<_, (String, String, String)>(
        r#"
        SELECT m.organization_id, o.name, m.role
        FROM members m
        INNER JOIN organizations o ON o.id = m.organization_id
        WHERE m.user_id = ?
        ORDER BY m.created_at
        "#,
    )
    .bind(session.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let memberships = rows
        .into_iter()
        .map(|(org_id, org_name, role)| {
            Ok(MembershipSummary {
                organization_id: Uuid::parse_str(&org_id)
                    .map_err(|_| AppError::internal("invalid organization id in members table"))?,
                organization_name: org_name,
                role: crate::authz::Role::parse(&role)
                    .ok_or_else(|| AppError::internal(format!("unknown role in members table: {role}")))?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Json(MeResponse {
        user,
        memberships,
        active_organization_id: session.active_organization_id,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/select-practice",
    tag = "Auth",
    request_body = SelectPracticeRequest,
    responses(
        (status = 200, description = "Token reissued for the selected practice", body = AuthResponse),
        (status = 404, description = "Caller is not a member of that organization")
    ),
    security(("bearerAuth" = []))
)]
pub async fn select_practice(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<SelectPracticeRequest>,
) -> AppResult<Json<AuthResponse>> {
    // Membership is the sole proof of access; without it the organization
    // must look like it does not exist.
    let exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM members WHERE user_id = ? AND organization_id = ?",
    )
    .bind(session.user_id.to_string())
    .bind(payload.organization_id.to_string())
    .fetch_one(&state.pool)
    .await?;

    if exists == 0 {
        return Err(AppError::NotAMember);
    }

    let user = fetch_user_by_id(&state.pool, session.user_id).await?;
    let token = state.jwt.encode(user.id, Some(payload.organization_id))?;

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(_session: AuthSession) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

async fn ensure_slug_available(pool: &SqlitePool, slug: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM organizations WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("practice name already in use"));
    }

    Ok(())
}

pub(crate) async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<User> {
    let db_user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    db_user.try_into()
}
