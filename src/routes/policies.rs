use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Capability;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthSession;
use crate::models::policy::{DbPolicy, Policy, PolicyCreateRequest, PolicyUpdateRequest};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/policies",
    tag = "Policies",
    responses((status = 200, description = "Policies of the active practice", body = [Policy])),
    security(("bearerAuth" = []))
)]
pub async fn list_policies(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<Vec<Policy>>> {
    let ctx = state.gate.authorize(&session, Capability::ManagePolicies).await?;

    let rows = sqlx::query_as::<_, DbPolicy>(
        "SELECT id, practice_id, title, body, created_at, updated_at FROM policies WHERE practice_id = ? ORDER BY title",
    )
    .bind(ctx.practice_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let policies = rows.into_iter().map(Policy::try_from).collect::<Result<_, _>>()?;

    Ok(Json(policies))
}

#[utoipa::path(
    post,
    path = "/policies",
    tag = "Policies",
    request_body = PolicyCreateRequest,
    responses((status = 201, description = "Policy created", body = Policy)),
    security(("bearerAuth" = []))
)]
pub async fn create_policy(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<PolicyCreateRequest>,
) -> AppResult<(StatusCode, Json<Policy>)> {
    let ctx = state.gate.authorize(&session, Capability::ManagePolicies).await?;

    let now = utc_now();
    let policy_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO policies (id, practice_id, title, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(policy_id.to_string())
    .bind(ctx.practice_id.to_string())
    .bind(&payload.title)
    .bind(&payload.body)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let policy = fetch_policy(&state, ctx.practice_id, policy_id).await?;

    log_activity(
        &state.event_bus,
        "created",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &policy,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(policy)))
}

#[utoipa::path(
    put,
    path = "/policies/{id}",
    tag = "Policies",
    params(("id" = Uuid, Path, description = "Policy id")),
    request_body = PolicyUpdateRequest,
    responses((status = 200, description = "Policy updated", body = Policy)),
    security(("bearerAuth" = []))
)]
pub async fn update_policy(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<PolicyUpdateRequest>,
) -> AppResult<Json<Policy>> {
    let ctx = state.gate.authorize(&session, Capability::ManagePolicies).await?;

    let old = fetch_policy(&state, ctx.practice_id, id).await?;
    let mut policy = old.clone();

    if let Some(title) = payload.title {
        policy.title = title;
    }
    if payload.body.is_some() {
        policy.body = payload.body;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE policies SET title = ?, body = ?, updated_at = ? WHERE id = ? AND practice_id = ?",
    )
    .bind(&policy.title)
    .bind(&policy.body)
    .bind(now)
    .bind(id.to_string())
    .bind(ctx.practice_id.to_string())
    .execute(&state.pool)
    .await?;

    policy.updated_at = now;

    log_activity(
        &state.event_bus,
        "updated",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &policy,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(policy))
}

async fn fetch_policy(state: &AppState, practice_id: Uuid, id: Uuid) -> AppResult<Policy> {
    let row = sqlx::query_as::<_, DbPolicy>(
        "SELECT id, practice_id, title, body, created_at, updated_at FROM policies WHERE id = ? AND practice_id = ?",
    )
    .bind(id.to_string())
    .bind(practice_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("policy not found"))?;

    row.try_into()
}
