use std::sync::Arc;

use uuid::Uuid;

use crate::authz::store::DirectoryStore;
use crate::authz::{is_allowed, Capability, Role};
use crate::errors::AppError;
use crate::jwt::AuthSession;

/// Request-scoped authorization result. Everything a handler needs to act
/// on behalf of the caller inside one practice; never persisted, never
/// shared across requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub practice_id: Uuid,
    pub role: Role,
    pub country_code: String,
    pub subscription_tier: String,
}

/// The single guarded entry point for tenant-scoped operations.
///
/// Session resolution has already happened by the time a handler holds an
/// [`AuthSession`]; `authorize` runs the remaining steps in order and fails
/// fast: active-practice hint, membership lookup, practice lookup,
/// capability check. Read-only — no step mutates membership or practice
/// state, so two calls against unchanged stores return the same answer.
#[derive(Clone)]
pub struct Gate {
    directory: Arc<dyn DirectoryStore>,
}

impl Gate {
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self { directory }
    }

    pub async fn authorize(
        &self,
        session: &AuthSession,
        capability: Capability,
    ) -> Result<AuthContext, AppError> {
        let organization_id = session
            .active_organization_id
            .ok_or(AppError::NoActivePractice)?;

        let membership = self
            .directory
            .get_membership(session.user_id, organization_id)
            .await?
            .ok_or(AppError::NotAMember)?;

        let practice = self
            .directory
            .get_practice(organization_id)
            .await?
            .ok_or_else(|| {
                // Membership without a practice row: alert, don't classify
                // as a normal auth outcome.
                tracing::error!(
                    organization_id = %organization_id,
                    user_id = %session.user_id,
                    "membership exists but practice record is missing"
                );
                AppError::PracticeMissing(organization_id)
            })?;

        if !is_allowed(membership.role, capability) {
            tracing::debug!(
                user_id = %session.user_id,
                practice_id = %practice.id,
                role = %membership.role,
                capability = %capability,
                "capability denied"
            );
            return Err(AppError::forbidden(capability));
        }

        Ok(AuthContext {
            user_id: session.user_id,
            organization_id,
            practice_id: practice.id,
            role: membership.role,
            country_code: practice.country_code,
            subscription_tier: practice.subscription_tier,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::models::member::Membership;
    use crate::models::practice::Practice;

    /// In-memory directory fake that counts lookups, so tests can assert
    /// which steps ran.
    #[derive(Default)]
    struct MemoryDirectory {
        members: HashMap<(Uuid, Uuid), Role>,
        practices: HashMap<Uuid, Practice>,
        membership_lookups: AtomicUsize,
        practice_lookups: AtomicUsize,
    }

    impl MemoryDirectory {
        fn with_member(mut self, user_id: Uuid, organization_id: Uuid, role: Role) -> Self {
            self.members.insert((user_id, organization_id), role);
            self
        }

        fn with_practice(mut self, organization_id: Uuid) -> Self {
            let now = Utc::now();
            self.practices.insert(
                organization_id,
                Practice {
                    id: Uuid::new_v4(),
                    organization_id,
                    country_code: "GB".to_string(),
                    subscription_tier: "trial".to_string(),
                    reminder_frequency: "weekly".to_string(),
                    created_at: now,
                    updated_at: now,
                },
            );
            self
        }
    }

    #[async_trait]
    impl DirectoryStore for MemoryDirectory {
        async fn get_membership(
            &self,
            user_id: Uuid,
            organization_id: Uuid,
        ) -> Result<Option<Membership>, AppError> {
            self.membership_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .members
                .get(&(user_id, organization_id))
                .map(|role| Membership {
                    user_id,
                    organization_id,
                    role: *role,
                    created_at: Utc::now(),
                }))
        }

        async fn get_practice(&self, organization_id: Uuid) -> Result<Option<Practice>, AppError> {
            self.practice_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.practices.get(&organization_id).cloned())
        }
    }

    fn session(user_id: Uuid, org: Option<Uuid>) -> AuthSession {
        AuthSession {
            user_id,
            active_organization_id: org,
        }
    }

    #[tokio::test]
    async fn owner_may_manage_billing() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let directory = MemoryDirectory::default()
            .with_member(user, org, Role::Owner)
            .with_practice(org);
        let gate = Gate::new(Arc::new(directory));

        let ctx = gate
            .authorize(&session(user, Some(org)), Capability::ManageBilling)
            .await
            .unwrap();

        assert_eq!(ctx.role, Role::Owner);
        assert_eq!(ctx.organization_id, org);
        assert_eq!(ctx.country_code, "GB");
    }

    #[tokio::test]
    async fn nurse_is_forbidden_to_manage_billing() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let directory = MemoryDirectory::default()
            .with_member(user, org, Role::Nurse)
            .with_practice(org);
        let gate = Gate::new(Arc::new(directory));

        let err = gate
            .authorize(&session(user, Some(org)), Capability::ManageBilling)
            .await
            .unwrap_err();

        match err {
            AppError::Forbidden { capability, allowed } => {
                assert_eq!(capability, Capability::ManageBilling);
                assert_eq!(allowed, &[Role::Owner]);
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_member_fails_with_not_a_member_for_any_capability() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        // Practice exists, but the user has no membership row.
        let directory = MemoryDirectory::default().with_practice(org);
        let gate = Gate::new(Arc::new(directory));

        for capability in Capability::ALL {
            let err = gate
                .authorize(&session(user, Some(org)), capability)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotAMember), "{capability}: {err:?}");
        }
    }

    #[tokio::test]
    async fn missing_hint_fails_before_any_lookup() {
        let user = Uuid::new_v4();
        let directory = Arc::new(MemoryDirectory::default());
        let gate = Gate::new(directory.clone());

        for capability in Capability::ALL {
            let err = gate.authorize(&session(user, None), capability).await.unwrap_err();
            assert!(matches!(err, AppError::NoActivePractice), "{capability}: {err:?}");
        }

        assert_eq!(directory.membership_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(directory.practice_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn membership_without_practice_row_is_an_integrity_failure() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let directory = MemoryDirectory::default().with_member(user, org, Role::Owner);
        let gate = Gate::new(Arc::new(directory));

        let err = gate
            .authorize(&session(user, Some(org)), Capability::CompleteTasks)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PracticeMissing(id) if id == org));
    }

    #[tokio::test]
    async fn authorize_is_idempotent_under_unchanged_state() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let directory = MemoryDirectory::default()
            .with_member(user, org, Role::Manager)
            .with_practice(org);
        let gate = Gate::new(Arc::new(directory));
        let s = session(user, Some(org));

        let first = gate.authorize(&s, Capability::ManageTasks).await.unwrap();
        let second = gate.authorize(&s, Capability::ManageTasks).await.unwrap();

        assert_eq!(first.practice_id, second.practice_id);
        assert_eq!(first.role, second.role);

        let denied_twice = (
            gate.authorize(&s, Capability::ManageBilling).await,
            gate.authorize(&s, Capability::ManageBilling).await,
        );
        assert!(matches!(denied_twice.0, Err(AppError::Forbidden { .. })));
        assert!(matches!(denied_twice.1, Err(AppError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn permission_table_is_tenant_independent() {
        let user = Uuid::new_v4();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let directory = MemoryDirectory::default()
            .with_member(user, org_a, Role::Manager)
            .with_member(user, org_b, Role::Manager)
            .with_practice(org_a)
            .with_practice(org_b);
        let gate = Gate::new(Arc::new(directory));

        // Same role, different tenants: same capability outcome.
        for capability in Capability::ALL {
            let a = gate.authorize(&session(user, Some(org_a)), capability).await;
            let b = gate.authorize(&session(user, Some(org_b)), capability).await;
            assert_eq!(a.is_ok(), b.is_ok(), "{capability}");
        }
    }

    #[tokio::test]
    async fn membership_in_one_tenant_grants_nothing_in_another() {
        let user = Uuid::new_v4();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let directory = MemoryDirectory::default()
            .with_member(user, org_a, Role::Owner)
            .with_practice(org_a)
            .with_practice(org_b);
        let gate = Gate::new(Arc::new(directory));

        let err = gate
            .authorize(&session(user, Some(org_b)), Capability::CompleteTasks)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAMember));
    }
}
