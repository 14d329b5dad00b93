use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for audit entries; drives retention and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Compliance-relevant events: long-term retention, never auto-deleted
    Critical,
    /// Routine events: medium-term retention (default)
    Important,
    /// High-volume events trimmed aggressively
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Important
    }
}

/// Entities that appear in the practice audit log implement this; the
/// entity type becomes the event-name prefix, e.g. "certificate.verified".
pub trait Loggable: Serialize + Send + Sync {
    fn entity_type() -> &'static str;

    /// Usually the entity's primary key
    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Some actions outrank the entity's base severity: deletions and role
    /// changes always matter.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "role_changed" | "removed" => Severity::Critical,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
