use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{AuthContext, Capability};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthSession;
use crate::models::certificate::{
    Certificate, CertificateUploadRequest, DbCertificate, STATUS_PENDING, STATUS_REJECTED,
    STATUS_VERIFIED,
};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/certificates",
    tag = "Certificates",
    responses((status = 200, description = "Certificates of the active practice", body = [Certificate])),
    security(("bearerAuth" = []))
)]
pub async fn list_certificates(
    State(state): State<AppState>,
    session: AuthSession,
) -> AppResult<Json<Vec<Certificate>>> {
    let ctx = state
        .gate
        .authorize(&session, Capability::UploadCertificates)
        .await?;

    let rows = sqlx::query_as::<_, DbCertificate>(
        "SELECT id, practice_id, uploaded_by, name, file_key, status, verified_by, verified_at, created_at FROM certificates WHERE practice_id = ? ORDER BY created_at DESC",
    )
    .bind(ctx.practice_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let certificates = rows
        .into_iter()
        .map(Certificate::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(certificates))
}

#[utoipa::path(
    post,
    path = "/certificates",
    tag = "Certificates",
    request_body = CertificateUploadRequest,
    responses((status = 201, description = "Certificate metadata recorded", body = Certificate)),
    security(("bearerAuth" = []))
)]
pub async fn upload_certificate(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<CertificateUploadRequest>,
) -> AppResult<(StatusCode, Json<Certificate>)> {
    let ctx = state
        .gate
        .authorize(&session, Capability::UploadCertificates)
        .await?;

    let now = utc_now();
    let certificate_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO certificates (id, practice_id, uploaded_by, name, file_key, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(certificate_id.to_string())
    .bind(ctx.practice_id.to_string())
    .bind(ctx.user_id.to_string())
    .bind(&payload.name)
    .bind(&payload.file_key)
    .bind(STATUS_PENDING)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let certificate = fetch_certificate(&state, &ctx, certificate_id).await?;

    log_activity(
        &state.event_bus,
        "uploaded",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &certificate,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(certificate)))
}

#[utoipa::path(
    post,
    path = "/certificates/{id}/verify",
    tag = "Certificates",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Certificate verified", body = Certificate),
        (status = 409, description = "Certificate already decided")
    ),
    security(("bearerAuth" = []))
)]
pub async fn verify_certificate(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Certificate>> {
    decide_certificate(state, session, headers, id, STATUS_VERIFIED, "verified").await
}

#[utoipa::path(
    post,
    path = "/certificates/{id}/reject",
    tag = "Certificates",
    params(("id" = Uuid, Path, description = "Certificate id")),
    responses(
        (status = 200, description = "Certificate rejected", body = Certificate),
        (status = 409, description = "Certificate already decided")
    ),
    security(("bearerAuth" = []))
)]
pub async fn reject_certificate(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Certificate>> {
    decide_certificate(state, session, headers, id, STATUS_REJECTED, "rejected").await
}

async fn decide_certificate(
    state: AppState,
    session: AuthSession,
    headers: HeaderMap,
    id: Uuid,
    status: &str,
    action: &str,
) -> AppResult<Json<Certificate>> {
    let ctx = state
        .gate
        .authorize(&session, Capability::VerifyCertificates)
        .await?;

    let old = fetch_certificate(&state, &ctx, id).await?;
    if old.status != STATUS_PENDING {
        return Err(AppError::conflict(format!(
            "certificate already {}",
            old.status
        )));
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE certificates SET status = ?, verified_by = ?, verified_at = ? WHERE id = ? AND practice_id = ?",
    )
    .bind(status)
    .bind(ctx.user_id.to_string())
    .bind(now)
    .bind(id.to_string())
    .bind(ctx.practice_id.to_string())
    .execute(&state.pool)
    .await?;

    let certificate = fetch_certificate(&state, &ctx, id).await?;

    log_activity(
        &state.event_bus,
        action,
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &certificate,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(certificate))
}

async fn fetch_certificate(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<Certificate> {
    let row = sqlx::query_as::<_, DbCertificate>(
        "SELECT id, practice_id, uploaded_by, name, file_key, status, verified_by, verified_at, created_at FROM certificates WHERE id = ? AND practice_id = ?",
    )
    .bind(id.to_string())
    .bind(ctx.practice_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("certificate not found"))?;

    row.try_into()
}
