use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

/// The join record proving a user belongs to an organization with a
/// specific role. Composite-unique on (user_id, organization_id): its
/// existence is the sole proof of access to that tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Membership {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Membership {
    fn entity_type() -> &'static str {
        "membership"
    }
    fn subject_id(&self) -> Uuid {
        self.user_id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMembership {
    pub user_id: String,
    pub organization_id: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbMembership> for Membership {
    type Error = AppError;

    fn try_from(value: DbMembership) -> Result<Self, Self::Error> {
        Ok(Membership {
            user_id: Uuid::parse_str(&value.user_id)
                .map_err(|_| AppError::internal("invalid user id in members table"))?,
            organization_id: Uuid::parse_str(&value.organization_id)
                .map_err(|_| AppError::internal("invalid organization id in members table"))?,
            // Closed enum: anything else in the column is corrupt data.
            role: Role::parse(&value.role)
                .ok_or_else(|| AppError::internal(format!("unknown role in members table: {}", value.role)))?,
            created_at: value.created_at,
        })
    }
}

/// Member as listed in the staff view, joined with the user profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberView {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    #[schema(example = "nurse@example.com")]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Role,
}
