use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

pub const SUBSCRIPTION_TIERS: [&str; 3] = ["trial", "standard", "premium"];
pub const REMINDER_FREQUENCIES: [&str; 3] = ["daily", "weekly", "monthly"];

/// The tenant identity record. Created exactly once at signup, together
/// with its practice attributes row, in a single transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbOrganization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbOrganization> for Organization {
    type Error = AppError;

    fn try_from(value: DbOrganization) -> Result<Self, Self::Error> {
        Ok(Organization {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("invalid id in organizations table"))?,
            name: value.name,
            slug: value.slug,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Per-tenant attributes needed by downstream operations: one row per
/// organization, unique on organization_id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Practice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub country_code: String,
    pub subscription_tier: String,
    pub reminder_frequency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Practice {
    fn entity_type() -> &'static str {
        "practice"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPractice {
    pub id: String,
    pub organization_id: String,
    pub country_code: String,
    pub subscription_tier: String,
    pub reminder_frequency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPractice> for Practice {
    type Error = AppError;

    fn try_from(value: DbPractice) -> Result<Self, Self::Error> {
        Ok(Practice {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("invalid id in practices table"))?,
            organization_id: Uuid::parse_str(&value.organization_id)
                .map_err(|_| AppError::internal("invalid organization id in practices table"))?,
            country_code: value.country_code,
            subscription_tier: value.subscription_tier,
            reminder_frequency: value.reminder_frequency,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BillingUpdateRequest {
    #[schema(example = "premium")]
    pub subscription_tier: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReminderUpdateRequest {
    #[schema(example = "weekly")]
    pub reminder_frequency: String,
}
