use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::Loggable;

/// A written practice policy (infection control, radiation protection, ...).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Policy {
    pub id: Uuid,
    pub practice_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Policy {
    fn entity_type() -> &'static str {
        "policy"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPolicy {
    pub id: String,
    pub practice_id: String,
    pub title: String,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPolicy> for Policy {
    type Error = AppError;

    fn try_from(value: DbPolicy) -> Result<Self, Self::Error> {
        Ok(Policy {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("invalid id in policies table"))?,
            practice_id: Uuid::parse_str(&value.practice_id)
                .map_err(|_| AppError::internal("invalid practice id in policies table"))?,
            title: value.title,
            body: value.body,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PolicyCreateRequest {
    #[schema(example = "Infection control policy")]
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PolicyUpdateRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}
