use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_VERIFIED: &str = "verified";
pub const STATUS_REJECTED: &str = "rejected";

/// Certificate metadata scoped to one practice. The file itself lives in
/// object storage under `file_key`; only the key is tracked here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Certificate {
    pub id: Uuid,
    pub practice_id: Uuid,
    pub uploaded_by: Uuid,
    pub name: String,
    pub file_key: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Certificate {
    fn entity_type() -> &'static str {
        "certificate"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            // Verification decisions are part of the compliance record.
            "verified" | "rejected" => Severity::Critical,
            _ => Severity::Important,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCertificate {
    pub id: String,
    pub practice_id: String,
    pub uploaded_by: String,
    pub name: String,
    pub file_key: String,
    pub status: String,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbCertificate> for Certificate {
    type Error = AppError;

    fn try_from(value: DbCertificate) -> Result<Self, Self::Error> {
        Ok(Certificate {
            id: Uuid::parse_str(&value.id)
                .map_err(|_| AppError::internal("invalid id in certificates table"))?,
            practice_id: Uuid::parse_str(&value.practice_id)
                .map_err(|_| AppError::internal("invalid practice id in certificates table"))?,
            uploaded_by: Uuid::parse_str(&value.uploaded_by)
                .map_err(|_| AppError::internal("invalid uploader id in certificates table"))?,
            name: value.name,
            file_key: value.file_key,
            status: value.status,
            verified_by: value
                .verified_by
                .map(|raw| {
                    Uuid::parse_str(&raw)
                        .map_err(|_| AppError::internal("invalid verifier id in certificates table"))
                })
                .transpose()?,
            verified_at: value.verified_at,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CertificateUploadRequest {
    #[schema(example = "Radiography CPD 2026")]
    pub name: String,
    /// Object-storage key where the uploaded file was placed
    #[schema(example = "certificates/2026/radiography-cpd.pdf")]
    pub file_key: String,
}
