//! Reminder API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::billing::ReminderDispatcher;
use crate::error::ApiError;
use crate::middleware::AdminPrincipal;
use crate::models::{ApiResponse, Principal, Reminder};

/// GET /api/reminders - the caller's reminders
pub async fn tenant_reminders(
    State(reminders): State<Arc<ReminderDispatcher>>,
    principal: Principal,
) -> Result<Json<ApiResponse<Vec<Reminder>>>, ApiError> {
    let list = reminders.tenant_reminders(principal.tenant_id).await?;
    Ok(Json(ApiResponse::ok(list)))
}

/// GET /api/admin/reminders
pub async fn pending_reminders(
    State(reminders): State<Arc<ReminderDispatcher>>,
    AdminPrincipal(_admin): AdminPrincipal,
) -> Result<Json<ApiResponse<Vec<Reminder>>>, ApiError> {
    Ok(Json(ApiResponse::ok(reminders.pending_reminders().await?)))
}

/// POST /api/admin/reminders/:id/paid
pub async fn mark_reminder_paid(
    State(reminders): State<Arc<ReminderDispatcher>>,
    AdminPrincipal(_admin): AdminPrincipal,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Reminder>>, ApiError> {
    let reminder = reminders.mark_paid(reminder_id).await?;
    Ok(Json(ApiResponse::ok(reminder)))
}
