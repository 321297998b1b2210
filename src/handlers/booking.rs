//! Booking API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::booking::{BookingService, BookingSummary};
use crate::error::ApiError;
use crate::models::{ApiResponse, Booking, PaymentMethod, Principal};
use crate::payment::PaymentSession;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub room_id: Uuid,
    /// `YYYY-MM-DD`
    #[validate(length(equal = 10))]
    pub start_date: String,
    #[validate(range(min = 1, max = 120))]
    pub duration_months: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtendBookingRequest {
    #[validate(range(min = 1, max = 120))]
    pub months: i32,
    pub payment_method: PaymentMethod,
}

/// POST /api/bookings
pub async fn create_booking(
    State(bookings): State<Arc<BookingService>>,
    principal: Principal,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ApiError> {
    request.validate()?;

    let booking = bookings
        .create_booking(
            principal.tenant_id,
            request.room_id,
            &request.start_date,
            request.duration_months,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(booking))))
}

/// GET /api/bookings - the caller's bookings
pub async fn list_bookings(
    State(bookings): State<Arc<BookingService>>,
    principal: Principal,
) -> Result<Json<ApiResponse<Vec<BookingSummary>>>, ApiError> {
    let summaries = bookings.list_tenant_bookings(principal.tenant_id).await?;
    Ok(Json(ApiResponse::ok(summaries)))
}

/// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(bookings): State<Arc<BookingService>>,
    principal: Principal,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = bookings.cancel_booking(booking_id, &principal).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// POST /api/bookings/:id/extend
pub async fn extend_booking(
    State(bookings): State<Arc<BookingService>>,
    principal: Principal,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<ExtendBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentSession>>), ApiError> {
    request.validate()?;

    let session = bookings
        .extend_booking(booking_id, request.months, &principal, request.payment_method)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(session))))
}
