use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::authz::{Capability, Role};
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::select_practice,
        routes::auth::logout,
        routes::members::list_members,
        routes::members::add_member,
        routes::members::update_member_role,
        routes::members::remove_member,
        routes::practice::update_billing,
        routes::practice::update_reminders,
        routes::tasks::list_tasks,
        routes::tasks::create_task,
        routes::tasks::update_task,
        routes::tasks::delete_task,
        routes::tasks::complete_task,
        routes::certificates::list_certificates,
        routes::certificates::upload_certificate,
        routes::certificates::verify_certificate,
        routes::certificates::reject_certificate,
        routes::policies::list_policies,
        routes::policies::create_policy,
        routes::policies::update_policy,
        routes::audit::list_audit_log,
        routes::health::health_check
    ),
    components(
        schemas(
            Role,
            Capability,
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::member::Membership,
            models::member::MemberView,
            models::member::AddMemberRequest,
            models::member::UpdateRoleRequest,
            models::practice::Practice,
            models::practice::BillingUpdateRequest,
            models::practice::ReminderUpdateRequest,
            models::task::ComplianceTask,
            models::task::TaskCreateRequest,
            models::task::TaskUpdateRequest,
            models::certificate::Certificate,
            models::certificate::CertificateUploadRequest,
            models::policy::Policy,
            models::policy::PolicyCreateRequest,
            models::policy::PolicyUpdateRequest,
            routes::auth::MessageResponse,
            routes::auth::MembershipSummary,
            routes::auth::MeResponse,
            routes::auth::SelectPracticeRequest,
            routes::audit::AuditEntry
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication and active practice selection"),
        (name = "Members", description = "Practice staff management"),
        (name = "Practice", description = "Practice settings"),
        (name = "Tasks", description = "Compliance task management"),
        (name = "Certificates", description = "Training certificate tracking"),
        (name = "Policies", description = "Practice policy documents"),
        (name = "Audit", description = "Audit trail"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
