use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::Loggable;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";

/// A compliance task scoped to one practice. Nurses only see and complete
/// tasks assigned to them; managers and owners see everything.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComplianceTask {
    pub id: Uuid,
    pub practice_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for ComplianceTask {
    fn entity_type() -> &'static str {
        "task"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbComplianceTask {
    pub id: String,
    pub practice_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub assigned_to: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn parse_optional_id(value: Option<String>, context: &str) -> Result<Option<Uuid>, AppError> {
    value
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|_| AppError::internal(format!("invalid {context} in compliance_tasks table")))
        })
        .transpose()
}

impl TryFrom<DbComplianceTask> for ComplianceTask {
    type Error = AppError;

    fn try_from(value: DbComplianceTask) -> Result<Self, Self::Error> {
        Ok(ComplianceTask {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("invalid id in compliance_tasks table"))?,
            practice_id: Uuid::parse_str(&value.practice_id)
                .map_err(|_| AppError::internal("invalid practice id in compliance_tasks table"))?,
            title: value.title,
            description: value.description,
            status: value.status,
            assigned_to: parse_optional_id(value.assigned_to, "assignee id")?,
            due_date: value.due_date,
            completed_at: value.completed_at,
            completed_by: parse_optional_id(value.completed_by, "completer id")?,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Autoclave weekly test")]
    pub title: String,
    pub description: Option<String>,
    /// Member of the practice the task is assigned to
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}
