use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::app::AppState;
use crate::authz::{AuthContext, Capability};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthSession;
use crate::models::practice::{
    BillingUpdateRequest, DbPractice, Practice, ReminderUpdateRequest, REMINDER_FREQUENCIES,
    SUBSCRIPTION_TIERS,
};
use crate::utils::utc_now;

#[utoipa::path(
    put,
    path = "/practice/billing",
    tag = "Practice",
    request_body = BillingUpdateRequest,
    responses(
        (status = 200, description = "Subscription tier updated", body = Practice),
        (status = 403, description = "Requires the owner role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_billing(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<BillingUpdateRequest>,
) -> AppResult<Json<Practice>> {
    let ctx = state.gate.authorize(&session, Capability::ManageBilling).await?;

    if !SUBSCRIPTION_TIERS.contains(&payload.subscription_tier.as_str()) {
        return Err(AppError::bad_request(format!(
            "unknown subscription tier: {}",
            payload.subscription_tier
        )));
    }

    let old = fetch_practice(&state, &ctx).await?;

    sqlx::query("UPDATE practices SET subscription_tier = ?, updated_at = ? WHERE id = ?")
        .bind(&payload.subscription_tier)
        .bind(utc_now())
        .bind(ctx.practice_id.to_string())
        .execute(&state.pool)
        .await?;

    let updated = fetch_practice(&state, &ctx).await?;

    log_activity(
        &state.event_bus,
        "updated",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &updated,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(updated))
}

#[utoipa::path(
    put,
    path = "/practice/reminders",
    tag = "Practice",
    request_body = ReminderUpdateRequest,
    responses(
        (status = 200, description = "Reminder schedule updated", body = Practice),
        (status = 403, description = "Requires the owner role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_reminders(
    State(state): State<AppState>,
    session: AuthSession,
    headers: HeaderMap,
    Json(payload): Json<ReminderUpdateRequest>,
) -> AppResult<Json<Practice>> {
    let ctx = state.gate.authorize(&session, Capability::ManageReminders).await?;

    if !REMINDER_FREQUENCIES.contains(&payload.reminder_frequency.as_str()) {
        return Err(AppError::bad_request(format!(
            "unknown reminder frequency: {}",
            payload.reminder_frequency
        )));
    }

    let old = fetch_practice(&state, &ctx).await?;

    sqlx::query("UPDATE practices SET reminder_frequency = ?, updated_at = ? WHERE id = ?")
        .bind(&payload.reminder_frequency)
        .bind(utc_now())
        .bind(ctx.practice_id.to_string())
        .execute(&state.pool)
        .await?;

    let updated = fetch_practice(&state, &ctx).await?;

    log_activity(
        &state.event_bus,
        "updated",
        Some(ctx.user_id),
        Some(ctx.practice_id),
        &updated,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(updated))
}

async fn fetch_practice(state: &AppState, ctx: &AuthContext) -> AppResult<Practice> {
    let row = sqlx::query_as::<_, DbPractice>(
        "SELECT id, organization_id, country_code, subscription_tier, reminder_frequency, created_at, updated_at FROM practices WHERE id = ?",
    )
    .bind(ctx.practice_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    // The variant names the organization whose practice row is gone.
    .ok_or(AppError::PracticeMissing(ctx.organization_id))?;

    row.try_into()
}
