use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Capability;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthSession;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Filter by severity (critical, important, noise)
    pub severity: Option<String>,
    /// Maximum entries to return, newest first (default 100, max 500)
    pub limit: Option<i64>,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub severity: String,
    #[schema(value_type = Object)]
    pub properties: Value,
}

#[derive(Debug, sqlx::FromRow)]
struct DbAuditEntry {
    id: String,
    event_name: String,
    description: String,
    actor_id: Option<String>,
    subject_id: Option<String>,
    occurred_at: DateTime<Utc>,
    severity: String,
    properties: String,
}

impl TryFrom<DbAuditEntry> for AuditEntry {
    type Error = AppError;

    fn try_from(row: DbAuditEntry) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: Uuid::parse_str(&row.id)
                .map_err(|_| AppError::internal("invalid id in audit_log"))?,
            event_name: row.event_name,
            description: row.description,
            actor_id: row
                .actor_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| AppError::internal("invalid actor id in audit_log"))?,
            subject_id: row
                .subject_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| AppError::internal("invalid subject id in audit_log"))?,
            occurred_at: row.occurred_at,
            severity: row.severity,
            properties: serde_json::from_str(&row.properties).unwrap_or(Value::Null),
        })
    }
}

#[utoipa::path(
    get,
    path = "/audit",
    tag = "Audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit trail of the active practice", body = [AuditEntry]),
        (status = 403, description = "Requires the owner or manager role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_audit_log(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    let ctx = state.gate.authorize(&session, Capability::ViewAuditLogs).await?;

    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let rows = if let Some(severity) = &query.severity {
        sqlx::query_as::<_, DbAuditEntry>(
            "SELECT id, event_name, description, actor_id, subject_id, occurred_at, severity, properties FROM audit_log WHERE practice_id = ? AND severity = ? ORDER BY occurred_at DESC LIMIT ?",
        )
        .bind(ctx.practice_id.to_string())
        .bind(severity)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?
    } else {
        sqlx::query_as::<_, DbAuditEntry>(
            "SELECT id, event_name, description, actor_id, subject_id, occurred_at, severity, properties FROM audit_log WHERE practice_id = ? ORDER BY occurred_at DESC LIMIT ?",
        )
        .bind(ctx.practice_id.to_string())
        .bind(limit)
        .fetch_all(&state.pool)
        .await?
    };

    let entries = rows
        .into_iter()
        .map(AuditEntry::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(entries))
}
