//! Payment route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments", post(create_payment))
        .route("/api/payments", get(list_payments))
        .route("/api/payments/:id/confirm", post(confirm_payment))
        .route("/api/payments/:id/reject", post(reject_payment))
        .route("/api/payments/:id/proof", post(attach_proof))
        .route("/api/payments/verify/:order_id", post(verify_payment))
        .route("/api/payments/notification", post(payment_notification))
}
