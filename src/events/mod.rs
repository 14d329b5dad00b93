use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

/// An audit-relevant fact that happened inside one practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    /// Tenant the event belongs to; `None` only for pre-signup events
    pub practice_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: Value,
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context captured alongside an audit entry (IP, User-Agent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// Structured audit payload: new state, optional old state, request context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

/// Publish an audit event for an entity. Fire and forget: an unavailable
/// listener must never fail the request that produced the event.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    practice_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
) {
    let severity = entity.severity_for_action(action);
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        context,
        severity,
    };

    let event = DomainEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_id,
        practice_id,
        subject_id: Some(entity.subject_id()),
        payload: serde_json::to_value(&payload).unwrap_or_default(),
    };

    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

fn describe(event_name: &str) -> &'static str {
    match event_name {
        "task.created" => "Compliance task created",
        "task.updated" => "Compliance task updated",
        "task.deleted" => "Compliance task deleted",
        "task.completed" => "Compliance task completed",
        "certificate.uploaded" => "Certificate uploaded",
        "certificate.verified" => "Certificate verified",
        "certificate.rejected" => "Certificate rejected",
        "policy.created" => "Policy created",
        "policy.updated" => "Policy updated",
        "membership.created" => "Member added",
        "membership.role_changed" => "Member role changed",
        "membership.removed" => "Member removed",
        "practice.created" => "Practice registered",
        "practice.updated" => "Practice settings changed",
        "user.registered" => "New user registered",
        _ => "System event",
    }
}

/// Projects events from the bus into the audit_log table and the
/// hash-chained event_store. Runs as a background task for the life of the
/// process; failures are logged and skipped, never retried.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("audit listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            // A burst overran the channel; the dropped events are gone but
            // the listener must keep projecting what follows.
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged, events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let event_json = event.clone();

        let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
        let actor_id = event
            .get("actor_id")
            .and_then(|v| v.as_str())
            .map(String::from);
        let practice_id = event
            .get("practice_id")
            .and_then(|v| v.as_str())
            .map(String::from);
        let subject_id = event
            .get("subject_id")
            .and_then(|v| v.as_str())
            .map(String::from);

        let occurred_at = event
            .get("occurred_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let severity = event
            .get("payload")
            .and_then(|p| p.get("severity"))
            .and_then(|s| s.as_str())
            .unwrap_or("important")
            .to_string();

        let properties = serde_json::to_string(&event_json).unwrap_or_default();

        let result = sqlx::query(
            "INSERT INTO audit_log (id, event_name, description, actor_id, practice_id, subject_id, occurred_at, properties, severity) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&name)
        .bind(describe(&name))
        .bind(&actor_id)
        .bind(&practice_id)
        .bind(&subject_id)
        .bind(occurred_at)
        .bind(&properties)
        .bind(&severity)
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::error!("failed to save audit log entry: {}", e);
        }

        // Tamper-evident chain: each stored event hashes the previous hash
        // together with its own payload.
        let prev_hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM event_store ORDER BY created_at DESC LIMIT 1")
                .fetch_optional(&pool)
                .await
                .ok()
                .flatten();

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        if let Some(ref ph) = prev_hash {
            hasher.update(ph.as_bytes());
        }
        hasher.update(properties.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let store_result = sqlx::query(
            "INSERT INTO event_store (id, event_name, occurred_at, actor_id, practice_id, subject_id, payload, severity, prev_hash, hash, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&name)
        .bind(occurred_at)
        .bind(&actor_id)
        .bind(&practice_id)
        .bind(&subject_id)
        .bind(&properties)
        .bind(&severity)
        .bind(&prev_hash)
        .bind(&hash)
        .bind(Utc::now())
        .execute(&pool)
        .await;

        if let Err(e) = store_result {
            tracing::error!("failed to save to event store: {}", e);
        }
    }
}
