//! Expiry sweeper - cancels reservations left unpaid too long

use chrono::Duration;
use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::BookingStatus;
use crate::store::Store;

/// Pending bookings older than this are cancelled
pub const PENDING_BOOKING_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub cancelled: usize,
    pub failed: usize,
}

pub struct ExpirySweeper {
    store: Arc<dyn Store>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Cancel Pending bookings created before `now - 7 days`.
    /// Best-effort: a failed booking is logged and the sweep moves on.
    pub async fn sweep(&self, now: DateTime<Utc>) -> ApiResult<SweepReport> {
        let cutoff = now - Duration::days(PENDING_BOOKING_TTL_DAYS);

        let expired: Vec<Uuid> = {
            let mut uow = self.store.begin().await?;
            uow.pending_bookings_created_before(cutoff)
                .await?
                .into_iter()
                .map(|b| b.id)
                .collect()
        };

        let mut report = SweepReport {
            expired: expired.len(),
            ..Default::default()
        };

        for booking_id in expired {
            match self.expire(booking_id).await {
                Ok(true) => {
                    report.cancelled += 1;
                    tracing::info!(booking_id = %booking_id, "Auto-cancelled expired booking");
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(booking_id = %booking_id, error = %e, "Failed to cancel expired booking");
                }
            }
        }

        tracing::info!(
            expired = report.expired,
            cancelled = report.cancelled,
            failed = report.failed,
            "Expiry sweep completed"
        );
        Ok(report)
    }

    async fn expire(&self, booking_id: Uuid) -> ApiResult<bool> {
        let mut uow = self.store.begin().await?;

        // May have been paid or cancelled since it was listed
        let Some(mut booking) = uow.lock_booking(booking_id).await? else {
            return Ok(false);
        };
        if booking.status != BookingStatus::Pending {
            return Ok(false);
        }

        booking.status = BookingStatus::Cancelled;
        uow.save_booking(&booking).await?;
        uow.commit().await?;
        Ok(true)
    }
}
