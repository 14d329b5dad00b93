use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Capability, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthSession;
use crate::models::member::{AddMemberRequest, MemberView, Membership, UpdateRoleRequest};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/members",
    tag = "Members",
    responses((status = 200, description = "Staff of the active practice", body = [MemberView])),
    security(("bearerAuth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<Vec<MemberView>>> {
    let ctx = state.gate.authorize(&session, Capability::ManageStaff).await?;

    let rows = sqlx::query_as::<_, (String, String, String, String, chrono::DateTime<chrono::Utc>)>(
        r#"
        SELECT m.user_id, u.name, u.email, m.role, m.created_at
        FROM members m
        INNER JOIN users u ON u.id = m.user_id
        WHERE m.organization_id = ?
        ORDER BY m.created_at
        "#,
    )
    .bind(ctx.organization_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let members = rows
        .into_iter()
        .map(|(user_id, name, email, role, joined_at)| {
            Ok(MemberView {
                user_id: Uuid::parse_str(&user_id)
                    .map_err(|_| AppError::internal("invalid user id in members table"))?,
                name,
                email,
                role: Role::parse(&role)
                    .ok_or_else(|| AppError::internal(format!("unknown role in members table: {role}")))?,
                joined_at,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Json(members))
}

#[utoipa::path(
    post,
    path = "/members",
    tag = "Members",
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = Membership),
        (status = 404, description = "No account with that email"),
        (status = 409, description = "Already a member")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<Membership>)> {
    let ctx = state.gate.authorize(&session, Capability::ManageStaff).await?;

    let user_id: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&payload.email)
        .fetch_optional(&state.pool)
        .await?;
    let user_id = user_id
        .ok_or_else(|| AppError::not_found("no account with that email"))?;
    let user_id = Uuid::parse_str(&user_id)
        .map_err(|_| AppError::internal("invalid user id in users table"))?;

    let already: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM members WHERE user_id = ? AND organization_id = ?",
    )
    .bind(user_id.to_string())
    .bind(ctx.organization_id.to_string())
    .fetch_one(&state.pool)
    .await?;
    if already > 0 {
        return Err(AppError::conflict("already a member of this practice"));
    }

    let now = utc_now();
    sqlx::query(
        "INSERT INTO members (user_id, organization_id, role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(ctx.organization_id.to_string())
    .bind(payload.role.as_str())
    .bind(now)
    .execute(&state.pool)
    .await?;

    let membership = Membership {
        user_id,
        organization_id: ctx.organization_id,
        role: payload.role,
        created_at: now,
    };

    log_activity(
        &state.event_bus,
        "created",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &membership,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(membership)))
}

#[utoipa::path(
    put,
    path = "/members/{user_id}/role",
    tag = "Members",
    params(("user_id" = Uuid, Path, description = "Member user id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = Membership),
        (status = 409, description = "Would leave the practice without an owner")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<Membership>> {
    let ctx = state.gate.authorize(&session, Capability::ManageStaff).await?;

    let current = fetch_membership(&state, user_id, ctx.organization_id).await?;

    if current.role == Role::Owner && payload.role != Role::Owner {
        ensure_not_last_owner(&state, ctx.organization_id).await?;
    }

    sqlx::query("UPDATE members SET role = ? WHERE user_id = ? AND organization_id = ?")
        .bind(payload.role.as_str())
        .bind(user_id.to_string())
        .bind(ctx.organization_id.to_string())
        .execute(&state.pool)
        .await?;

    let updated = Membership {
        role: payload.role,
        ..current.clone()
    };

    log_activity(
        &state.event_bus,
        "role_changed",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &updated,
        Some(&current),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/members/{user_id}",
    tag = "Members",
    params(("user_id" = Uuid, Path, description = "Member user id")),
    responses(
        (status = 204, description = "Member removed"),
        (status = 409, description = "Would leave the practice without an owner")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let ctx = state.gate.authorize(&session, Capability::ManageStaff).await?;

    let current = fetch_membership(&state, user_id, ctx.organization_id).await?;

    if current.role == Role::Owner {
        ensure_not_last_owner(&state, ctx.organization_id).await?;
    }

    sqlx::query("DELETE FROM members WHERE user_id = ? AND organization_id = ?")
        .bind(user_id.to_string())
        .bind(ctx.organization_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(
        &state.event_bus,
        "removed",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &current,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_membership(
    state: &AppState,
    user_id: Uuid,
    organization_id: Uuid,
) -> AppResult<Membership> {
    use crate::models::member::DbMembership;

    let row = sqlx::query_as::<_, DbMembership>(
        "SELECT user_id, organization_id, role, created_at FROM members WHERE user_id = ? AND organization_id = ?",
    )
    .bind(user_id.to_string())
    .bind(organization_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("member not found"))?;

    row.try_into()
}

async fn ensure_not_last_owner(state: &AppState, organization_id: Uuid) -> AppResult<()> {
    let owners: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM members WHERE organization_id = ? AND role = 'owner'",
    )
    .bind(organization_id.to_string())
    .fetch_one(&state.pool)
    .await?;

    if owners <= 1 {
        return Err(AppError::conflict("a practice must retain at least one owner"));
    }

    Ok(())
}
