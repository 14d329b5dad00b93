use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::authz::{describe_roles, Capability, Role};

pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy.
///
/// The first five variants are the classified outcomes of the authorization
/// gate; handlers must propagate them unchanged so the HTTP layer can pick
/// the right user-facing behavior (redirect to sign-in, practice selection,
/// generic not-found, ...). The rest are ordinary boundary errors.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("no active practice selected")]
    NoActivePractice,
    #[error("not a member of the active practice")]
    NotAMember,
    #[error("forbidden: {} requires one of: {}", capability.as_str(), describe_roles(allowed))]
    Forbidden {
        capability: Capability,
        allowed: &'static [Role],
    },
    // A membership row points at an organization with no practice record.
    // Data-integrity violation, never a normal auth outcome.
    #[error("practice record missing for organization {0}")]
    PracticeMissing(Uuid),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(capability: Capability) -> Self {
        Self::Forbidden {
            capability,
            allowed: capability.allowed_roles(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NoActivePractice => StatusCode::PRECONDITION_FAILED,
            // Membership is the sole proof of access; absence must read the
            // same as the tenant not existing at all.
            AppError::NotAMember => StatusCode::NOT_FOUND,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::PracticeMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = match &self {
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::NoActivePractice => "no_active_practice",
            AppError::NotAMember => "not_found",
            AppError::Forbidden { .. } => "forbidden",
            AppError::PracticeMissing(_) => "internal",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        };

        let message = match &self {
            // Generic bodies: neither leaks what the caller may not see.
            AppError::NotAMember => "not found".to_string(),
            AppError::PracticeMissing(_) => "internal server error".to_string(),
            AppError::Database(_) => "internal server error".to_string(),
            // The body carries the plain message; the classification already
            // sits in the error code.
            AppError::NotFound(message) => message.clone(),
            other => other.to_string(),
        };

        if let AppError::Database(ref err) = self {
            tracing::error!(error = %err, "database error");
        }

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
