use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role of a member within a practice. Closed set: a member always has
/// exactly one of these, stored as text and parsed back through the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Practice owner: full access including billing
    Owner,
    /// Practice manager: compliance oversight, no billing
    Manager,
    /// Dental nurse: task completion and certificate uploads
    Nurse,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Manager, Role::Nurse];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Nurse => "nurse",
        }
    }

    /// Parse a stored role. `None` means the stored value is outside the
    /// closed set, which is a data-integrity problem, not a user error.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "owner" => Some(Role::Owner),
            "manager" => Some(Role::Manager),
            "nurse" => Some(Role::Nurse),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named operation categories checked against a role. Adding a capability
/// means extending `allowed_roles` in the same change; the match is
/// exhaustive so a new variant will not compile without an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ManageBilling,
    ManageStaff,
    ManageTasks,
    CompleteTasks,
    VerifyCertificates,
    UploadCertificates,
    ManagePolicies,
    ViewAuditLogs,
    ManageReminders,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::ManageBilling,
        Capability::ManageStaff,
        Capability::ManageTasks,
        Capability::CompleteTasks,
        Capability::VerifyCertificates,
        Capability::UploadCertificates,
        Capability::ManagePolicies,
        Capability::ViewAuditLogs,
        Capability::ManageReminders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageBilling => "manage-billing",
            Capability::ManageStaff => "manage-staff",
            Capability::ManageTasks => "manage-tasks",
            Capability::CompleteTasks => "complete-tasks",
            Capability::VerifyCertificates => "verify-certificates",
            Capability::UploadCertificates => "upload-certificates",
            Capability::ManagePolicies => "manage-policies",
            Capability::ViewAuditLogs => "view-audit-logs",
            Capability::ManageReminders => "manage-reminders",
        }
    }

    /// The permission table: which roles hold this capability. Fixed
    /// configuration, identical for every practice.
    pub fn allowed_roles(&self) -> &'static [Role] {
        use Role::*;
        match self {
            Capability::ManageBilling => &[Owner],
            Capability::ManageStaff => &[Owner, Manager],
            Capability::ManageTasks => &[Owner, Manager],
            Capability::CompleteTasks => &[Owner, Manager, Nurse],
            Capability::VerifyCertificates => &[Owner, Manager],
            Capability::UploadCertificates => &[Owner, Manager, Nurse],
            Capability::ManagePolicies => &[Owner, Manager],
            Capability::ViewAuditLogs => &[Owner, Manager],
            Capability::ManageReminders => &[Owner],
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure permission check; no I/O.
pub fn is_allowed(role: Role, capability: Capability) -> bool {
    capability.allowed_roles().contains(&role)
}

pub fn describe_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Expected answer for every (role, capability) pair. Exhaustive on
    /// purpose: reviewing this table reviews the whole policy.
    fn expected(role: Role, capability: Capability) -> bool {
        use Capability::*;
        use Role::*;
        match (role, capability) {
            (Owner, _) => true,

            (Manager, ManageBilling) => false,
            (Manager, ManageReminders) => false,
            (Manager, _) => true,

            (Nurse, CompleteTasks) => true,
            (Nurse, UploadCertificates) => true,
            (Nurse, _) => false,
        }
    }

    #[test]
    fn permission_table_is_total_and_matches_policy() {
        for role in Role::ALL {
            for capability in Capability::ALL {
                assert_eq!(
                    is_allowed(role, capability),
                    expected(role, capability),
                    "mismatch for ({role}, {capability})"
                );
            }
        }
    }

    #[test]
    fn billing_is_owner_only() {
        assert!(is_allowed(Role::Owner, Capability::ManageBilling));
        assert!(!is_allowed(Role::Manager, Capability::ManageBilling));
        assert!(!is_allowed(Role::Nurse, Capability::ManageBilling));
    }

    #[test]
    fn every_role_can_complete_tasks_and_upload_certificates() {
        for role in Role::ALL {
            assert!(is_allowed(role, Capability::CompleteTasks));
            assert!(is_allowed(role, Capability::UploadCertificates));
        }
    }

    #[test]
    fn nurse_holds_no_management_capabilities() {
        for capability in [
            Capability::ManageBilling,
            Capability::ManageStaff,
            Capability::ManageTasks,
            Capability::VerifyCertificates,
            Capability::ManagePolicies,
            Capability::ViewAuditLogs,
            Capability::ManageReminders,
        ] {
            assert!(!is_allowed(Role::Nurse, capability), "{capability}");
        }
    }

    #[test]
    fn role_round_trips_through_text() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("super_admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn describe_roles_joins_names() {
        assert_eq!(
            describe_roles(Capability::ManageStaff.allowed_roles()),
            "owner, manager"
        );
    }
}
