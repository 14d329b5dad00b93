use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::member::{DbMembership, Membership};
use crate::models::practice::{DbPractice, Practice};

/// The keyed lookups the authorization gate depends on. Read-only: a lookup
/// never creates or mutates rows. Injected so the gate can be tested with an
/// in-memory fake, independent of any database.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Membership for (user, organization), or `None` when the user is not
    /// a member of that organization.
    async fn get_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, AppError>;

    /// Practice attributes for an organization, or `None` when no practice
    /// record exists.
    async fn get_practice(&self, organization_id: Uuid) -> Result<Option<Practice>, AppError>;
}

/// SQL-backed directory over the members and practices tables.
pub struct SqlDirectoryStore {
    pool: SqlitePool,
}

impl SqlDirectoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryStore for SqlDirectoryStore {
    async fn get_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, AppError> {
        let row = sqlx::query_as::<_, DbMembership>(
            "SELECT user_id, organization_id, role, created_at FROM members WHERE user_id = ? AND organization_id = ?",
        )
        .bind(user_id.to_string())
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Membership::try_from).transpose()
    }

    async fn get_practice(&self, organization_id: Uuid) -> Result<Option<Practice>, AppError> {
        let row = sqlx::query_as::<_, DbPractice>(
            "SELECT id, organization_id, country_code, subscription_tier, reminder_frequency, created_at, updated_at FROM practices WHERE organization_id = ?",
        )
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Practice::try_from).transpose()
    }
}
