//! Reminder route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn reminder_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reminders", get(tenant_reminders))
        .route("/api/admin/reminders", get(pending_reminders))
        .route("/api/admin/reminders/:id/paid", post(mark_reminder_paid))
}
