//! Settlement coordinator
//!
//! Applies a payment outcome to payment, booking and room inside one unit of
//! work. A missing booking or room is not an error: whatever could be located
//! is updated and committed. Any write failure rolls the whole unit back.
//!
//! The payment row is locked before its status is inspected, so concurrent
//! settle and fail calls on one payment are applied one after the other.

use sqlx::types::chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::model::{Outcome, Settlement, Transition};
use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, BookingStatus, PaymentStatus, RoomStatus};
use crate::notify::{NotificationDispatcher, NotificationJob};
use crate::store::{Store, StoreError, UnitOfWork};

/// Whether confirming `booking` would give its tenant a second active booking.
///
/// Takes the tenant lock so a concurrent booking creation cannot slip in
/// between the check and the write.
async fn revival_clashes(
    uow: &mut dyn UnitOfWork,
    booking: &Booking,
) -> Result<bool, StoreError> {
    if booking.status != BookingStatus::Cancelled {
        return Ok(false);
    }
    uow.lock_tenant(booking.tenant_id).await?;
    let bookings = uow.bookings_for_tenant(booking.tenant_id).await?;
    Ok(bookings.iter().any(|b| b.id != booking.id && b.is_active()))
}

pub struct SettlementCoordinator {
    store: Arc<dyn Store>,
    notifications: Arc<NotificationDispatcher>,
}

impl SettlementCoordinator {
    pub fn new(store: Arc<dyn Store>, notifications: Arc<NotificationDispatcher>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Mark a payment paid and cascade Booking → Confirmed, Room → Full
    pub async fn settle(&self, payment_id: Uuid, outcome: Outcome) -> ApiResult<Settlement> {
        let mut uow = self.store.begin().await.map_err(ApiError::Transaction)?;

        let mut payment = uow
            .lock_payment(payment_id)
            .await
            .map_err(ApiError::Transaction)?
            .ok_or_else(|| ApiError::not_found("payment", payment_id))?;

        if payment.status.is_paid() {
            tracing::info!(payment_id = %payment_id, status = ?payment.status, "Payment already settled, skipping");
            return Ok(Settlement::unchanged(payment));
        }

        payment.status = match &outcome {
            Outcome::Confirmed { .. } => PaymentStatus::Confirmed,
            Outcome::Settled => PaymentStatus::Settled,
        };
        payment.paid_at = Some(Utc::now());
        if let Outcome::Confirmed {
            proof_url: Some(url),
        } = outcome
        {
            payment.proof_url = Some(url);
        }
        uow.save_payment(&payment)
            .await
            .map_err(ApiError::Transaction)?;

        let mut booking = uow
            .lock_booking(payment.booking_id)
            .await
            .map_err(ApiError::Transaction)?;

        let mut room = None;
        let mut booking_confirmed = false;
        match booking.as_mut() {
            Some(b) => {
                let clashes = revival_clashes(uow.as_mut(), b)
                    .await
                    .map_err(ApiError::Transaction)?;
                if clashes {
                    // The money is recorded; the tenant has moved on to another booking
                    tracing::warn!(
                        payment_id = %payment_id,
                        booking_id = %b.id,
                        tenant_id = %b.tenant_id,
                        "Cancelled booking not revived, tenant already has an active booking"
                    );
                } else {
                    b.status = BookingStatus::Confirmed;
                    uow.save_booking(b).await.map_err(ApiError::Transaction)?;
                    booking_confirmed = true;

                    room = uow.find_room(b.room_id).await.map_err(ApiError::Transaction)?;
                    match room.as_mut() {
                        Some(r) => {
                            r.status = RoomStatus::Full;
                            uow.save_room(r).await.map_err(ApiError::Transaction)?;
                        }
                        None => {
                            tracing::warn!(payment_id = %payment_id, room_id = %b.room_id, "Room not found, settling without room update")
                        }
                    }
                }
            }
            None => {
                tracing::warn!(payment_id = %payment_id, booking_id = %payment.booking_id, "Booking not found, settling payment only")
            }
        }

        uow.commit().await.map_err(ApiError::Transaction)?;

        tracing::info!(
            payment_id = %payment_id,
            status = ?payment.status,
            booking_confirmed,
            room_full = room.is_some(),
            "Payment settled"
        );

        self.notifications
            .enqueue(NotificationJob::PaymentReceived { payment_id })
            .await;

        Ok(Settlement {
            transition: Transition::Applied,
            payment,
            booking,
            room,
        })
    }

    /// Mark a payment failed. Booking and room are left alone.
    pub async fn fail(&self, payment_id: Uuid) -> ApiResult<Settlement> {
        let mut uow = self.store.begin().await.map_err(ApiError::Transaction)?;

        let mut payment = uow
            .lock_payment(payment_id)
            .await
            .map_err(ApiError::Transaction)?
            .ok_or_else(|| ApiError::not_found("payment", payment_id))?;

        // A late failure never un-settles a payment
        if payment.status == PaymentStatus::Failed || payment.status.is_paid() {
            tracing::info!(payment_id = %payment_id, status = ?payment.status, "Payment already terminal, skipping failure");
            return Ok(Settlement::unchanged(payment));
        }

        payment.status = PaymentStatus::Failed;
        uow.save_payment(&payment)
            .await
            .map_err(ApiError::Transaction)?;
        uow.commit().await.map_err(ApiError::Transaction)?;

        tracing::info!(payment_id = %payment_id, "Payment failed");
        Ok(Settlement {
            transition: Transition::Applied,
            payment,
            booking: None,
            room: None,
        })
    }

    /// Admin rejection. The payment stays the booking's open bill.
    pub async fn reject(&self, payment_id: Uuid) -> ApiResult<Settlement> {
        let mut uow = self.store.begin().await?;

        let mut payment = uow
            .lock_payment(payment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("payment", payment_id))?;

        match payment.status {
            PaymentStatus::Rejected => return Ok(Settlement::unchanged(payment)),
            PaymentStatus::Pending => {}
            other => {
                return Err(ApiError::Validation(format!(
                    "cannot reject a payment that is {:?}",
                    other
                )))
            }
        }

        payment.status = PaymentStatus::Rejected;
        uow.save_payment(&payment).await?;
        uow.commit().await?;

        tracing::info!(payment_id = %payment_id, "Payment rejected");
        Ok(Settlement {
            transition: Transition::Applied,
            payment,
            booking: None,
            room: None,
        })
    }
}
