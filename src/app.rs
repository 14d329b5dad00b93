use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{Gate, SqlDirectoryStore};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{audit, auth, certificates, health, members, policies, practice, tasks};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub gate: Gate,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        let gate = Gate::new(Arc::new(SqlDirectoryStore::new(pool.clone())));
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            gate,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/select-practice", post(auth::select_practice))
        .route("/logout", post(auth::logout));

    let member_routes = Router::new()
        .route("/", get(members::list_members))
        .route("/", post(members::add_member))
        .route("/:user_id/role", put(members::update_member_role))
        .route("/:user_id", delete(members::remove_member));

    let practice_routes = Router::new()
        .route("/billing", put(practice::update_billing))
        .route("/reminders", put(practice::update_reminders));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks))
        .route("/", post(tasks::create_task))
        .route("/:id", put(tasks::update_task))
        .route("/:id", delete(tasks::delete_task))
        .route("/:id/complete", post(tasks::complete_task));

    let certificate_routes = Router::new()
        .route("/", get(certificates::list_certificates))
        .route("/", post(certificates::upload_certificate))
        .route("/:id/verify", post(certificates::verify_certificate))
        .route("/:id/reject", post(certificates::reject_certificate));

    let policy_routes = Router::new()
        .route("/", get(policies::list_policies))
        .route("/", post(policies::create_policy))
        .route("/:id", put(policies::update_policy));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/members", member_routes)
        .nest("/practice", practice_routes)
        .nest("/tasks", task_routes)
        .nest("/certificates", certificate_routes)
        .nest("/policies", policy_routes)
        .route("/audit", get(audit::list_audit_log))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
