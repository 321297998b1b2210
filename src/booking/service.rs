//! Booking service layer

use sqlx::types::chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::model::{parse_start_date, BookingSummary};
use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, BookingStatus, PaymentMethod, Principal};
use crate::payment::{PaymentSession, PaymentSessionService};
use crate::store::{NewBooking, Store, StoreError};

/// Booking service
pub struct BookingService {
    store: Arc<dyn Store>,
    payments: Arc<PaymentSessionService>,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>, payments: Arc<PaymentSessionService>) -> Self {
        Self { store, payments }
    }

    /// Reserve a room. Fails if the tenant already holds an active booking.
    pub async fn create_booking(
        &self,
        tenant_id: Uuid,
        room_id: Uuid,
        start_date: &str,
        duration_months: i32,
    ) -> ApiResult<Booking> {
        if duration_months < 1 {
            return Err(ApiError::Validation(
                "duration must be at least one month".to_string(),
            ));
        }
        let start_date = parse_start_date(start_date)?;

        let mut uow = self.store.begin().await?;

        // Serializes concurrent creations for this tenant up to commit
        uow.lock_tenant(tenant_id).await?;

        uow.find_room(room_id)
            .await?
            .ok_or_else(|| ApiError::not_found("room", room_id))?;

        let existing = uow.bookings_for_tenant(tenant_id).await?;
        if existing.iter().any(Booking::is_active) {
            return Err(ApiError::ActiveBookingExists);
        }

        let booking = uow
            .insert_booking(NewBooking {
                tenant_id,
                room_id,
                start_date,
                duration_months,
                status: BookingStatus::Pending,
                created_at: Utc::now(),
            })
            .await
            .map_err(active_booking_conflict)?;
        uow.commit().await.map_err(active_booking_conflict)?;

        tracing::info!(
            booking_id = %booking.id,
            tenant_id = %tenant_id,
            room_id = %room_id,
            "Booking created"
        );
        Ok(booking)
    }

    /// Cancel a booking owned by the requester. Paid amounts are not refunded.
    pub async fn cancel_booking(&self, booking_id: Uuid, requester: &Principal) -> ApiResult<Booking> {
        let mut uow = self.store.begin().await?;

        let mut booking = uow
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| ApiError::not_found("booking", booking_id))?;

        if !requester.owns(&booking) {
            return Err(ApiError::Unauthorized(
                "you can only cancel your own bookings".to_string(),
            ));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(ApiError::AlreadyCancelled);
        }

        booking.status = BookingStatus::Cancelled;
        uow.save_booking(&booking).await?;
        uow.commit().await?;

        tracing::info!(booking_id = %booking_id, "Booking cancelled");
        Ok(booking)
    }

    /// Open a payment for `months` more months. The booking itself is unchanged.
    pub async fn extend_booking(
        &self,
        booking_id: Uuid,
        months: i32,
        requester: &Principal,
        method: PaymentMethod,
    ) -> ApiResult<PaymentSession> {
        {
            let mut uow = self.store.begin().await?;
            let booking = uow
                .find_booking(booking_id)
                .await?
                .ok_or_else(|| ApiError::not_found("booking", booking_id))?;

            if !requester.owns(&booking) {
                return Err(ApiError::Unauthorized(
                    "you can only extend your own bookings".to_string(),
                ));
            }
        }

        self.payments
            .open_extension(booking_id, months, method)
            .await
    }

    /// The tenant's bookings, newest first, with rooms and payments
    pub async fn list_tenant_bookings(&self, tenant_id: Uuid) -> ApiResult<Vec<BookingSummary>> {
        let mut uow = self.store.begin().await?;

        let bookings = uow.bookings_for_tenant(tenant_id).await?;
        let mut summaries = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let room = uow.find_room(booking.room_id).await?;
            let payments = uow.payments_for_booking(booking.id).await?;
            summaries.push(BookingSummary::new(booking, room, payments));
        }

        Ok(summaries)
    }
}

fn active_booking_conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(_) => ApiError::ActiveBookingExists,
        other => other.into(),
    }
}
