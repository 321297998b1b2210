//! Route definitions for the kosan API

mod booking;
mod payment;
mod reminder;

pub use booking::booking_routes;
pub use payment::payment_routes;
pub use reminder::reminder_routes;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers::health_check;
use crate::middleware;
use crate::state::AppState;

/// Full API router with request tracing; CORS is layered on by the binary
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(booking_routes())
        .merge(payment_routes())
        .merge(reminder_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::request_tracing)),
        )
}
