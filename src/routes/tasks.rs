use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{AuthContext, Capability, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthSession;
use crate::models::task::{
    ComplianceTask, DbComplianceTask, TaskCreateRequest, TaskUpdateRequest, STATUS_COMPLETED,
    STATUS_PENDING,
};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    responses((status = 200, description = "Tasks of the active practice", body = [ComplianceTask])),
    security(("bearerAuth" = []))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<Vec<ComplianceTask>>> {
    let ctx = state.gate.authorize(&session, Capability::CompleteTasks).await?;

    // Nurses see only their own assignments; managers and owners see the
    // whole practice.
    let rows = if ctx.role == Role::Nurse {
        sqlx::query_as::<_, DbComplianceTask>(
            "SELECT id, practice_id, title, description, status, assigned_to, due_date, completed_at, completed_by, created_at, updated_at FROM compliance_tasks WHERE practice_id = ? AND assigned_to = ? ORDER BY created_at DESC",
        )
        .bind(ctx.practice_id.to_string())
        .bind(ctx.user_id.to_string())
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as::<_, DbComplianceTask>(
            "SELECT id, practice_id, title, description, status, assigned_to, due_date, completed_at, completed_by, created_at, updated_at FROM compliance_tasks WHERE practice_id = ? ORDER BY created_at DESC",
        )
        .bind(ctx.practice_id.to_string())
        .fetch_all(&state.pool)
        .await?
    };

    let tasks = rows
        .into_iter()
        .map(ComplianceTask::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = ComplianceTask),
        (status = 400, description = "Assignee is not a member of the practice")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<ComplianceTask>)> {
    let ctx = state.gate.authorize(&session, Capability::ManageTasks).await?;

    if let Some(assignee) = payload.assigned_to {
        ensure_assignee_is_member(&state, &ctx, assignee).await?;
    }

    let now = utc_now();
    let task_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO compliance_tasks (id, practice_id, title, description, status, assigned_to, due_date, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id.to_string())
    .bind(ctx.practice_id.to_string())
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(STATUS_PENDING)
    .bind(payload.assigned_to.map(|id| id.to_string()))
    .bind(payload.due_date)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let task = fetch_task(&state, &ctx, task_id).await?;

    log_activity(
        &state.event_bus,
        "created",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &task,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses((status = 200, description = "Task updated", body = ComplianceTask)),
    security(("bearerAuth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<ComplianceTask>> {
    let ctx = state.gate.authorize(&session, Capability::ManageTasks).await?;

    let old = fetch_task(&state, &ctx, id).await?;
    let mut task = old.clone();

    if let Some(title) = payload.title {
        task.title = title;
    }
    if payload.description.is_some() {
        task.description = payload.description;
    }
    if let Some(assignee) = payload.assigned_to {
        ensure_assignee_is_member(&state, &ctx, assignee).await?;
        task.assigned_to = Some(assignee);
    }
    if payload.due_date.is_some() {
        task.due_date = payload.due_date;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE compliance_tasks SET title = ?, description = ?, assigned_to = ?, due_date = ?, updated_at = ? WHERE id = ? AND practice_id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.assigned_to.map(|u| u.to_string()))
    .bind(task.due_date)
    .bind(now)
    .bind(id.to_string())
    .bind(ctx.practice_id.to_string())
    .execute(&state.pool)
    .await?;

    task.updated_at = now;

    log_activity(
        &state.event_bus,
        "updated",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &task,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses((status = 204, description = "Task deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let ctx = state.gate.authorize(&session, Capability::ManageTasks).await?;

    let task = fetch_task(&state, &ctx, id).await?;

    sqlx::query("DELETE FROM compliance_tasks WHERE id = ? AND practice_id = ?")
        .bind(id.to_string())
        .bind(ctx.practice_id.to_string())
        .execute(&state.pool)
        .await?;

    log_activity(
        &state.event_bus,
        "deleted",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &task,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/complete",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task completed", body = ComplianceTask),
        (status = 409, description = "Task already completed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn complete_task(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ComplianceTask>> {
    let ctx = state.gate.authorize(&session, Capability::CompleteTasks).await?;

    let old = fetch_task(&state, &ctx, id).await?;

    // A nurse may only complete a task assigned to them; anything else
    // reads as nonexistent.
    if ctx.role == Role::Nurse && old.assigned_to != Some(ctx.user_id) {
        return Err(AppError::not_found("task not found"));
    }

    if old.status == STATUS_COMPLETED {
        return Err(AppError::conflict("task already completed"));
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE compliance_tasks SET status = ?, completed_at = ?, completed_by = ?, updated_at = ? WHERE id = ? AND practice_id = ?",
    )
    .bind(STATUS_COMPLETED)
    .bind(now)
    .bind(ctx.user_id.to_string())
    .bind(now)
    .bind(id.to_string())
    .bind(ctx.practice_id.to_string())
    .execute(&state.pool)
    .await?;

    let task = fetch_task(&state, &ctx, id).await?;

    log_activity(
        &state.event_bus,
        "completed",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &task,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(task))
}

/// Tenant-filtered fetch: a task outside the caller's practice is
/// indistinguishable from a missing one.
async fn fetch_task(state: &AppState, ctx: &AuthContext, id: Uuid) -> AppResult<ComplianceTask> {
    let row = sqlx::query_as::<_, DbComplianceTask>(
        "SELECT id, practice_id, title, description, status, assigned_to, due_date, completed_at, completed_by, created_at, updated_at FROM compliance_tasks WHERE id = ? AND practice_id = ?",
    )
    .bind(id.to_string())
    .bind(ctx.practice_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("task not found"))?;

    row.try_into()
}

async fn ensure_assignee_is_member(
    state: &AppState,
    ctx: &AuthContext,
    assignee: Uuid,
) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM members WHERE user_id = ? AND organization_id = ?",
    )
    .bind(assignee.to_string())
    .bind(ctx.organization_id.to_string())
    .fetch_one(&state.pool)
    .await?;

    if count == 0 {
        return Err(AppError::bad_request("assignee is not a member of this practice"));
    }

    Ok(())
}
