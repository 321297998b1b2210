//! Billing cycle generator
//!
//! For every confirmed lease, opens next month's extend-bill and its reminder
//! once the paid-up period is within a week of running out.

use chrono::{Days, Months, NaiveDate};
use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus, PaymentType};
use crate::store::{NewPayment, NewReminder, Store, StoreError};

/// A bill is opened this many days before the paid-up period ends
pub const BILLING_LEAD_DAYS: u64 = 7;
/// The reminder fires this many days before the bill is due
pub const REMINDER_LEAD_DAYS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDecision {
    /// An unresolved bill already exists
    OpenBillExists,
    NoPrice,
    /// The paid-up date is outside the calendar
    OutOfRange,
    NotDue { paid_until: NaiveDate },
    Bill {
        due_date: NaiveDate,
        reminder_date: NaiveDate,
    },
}

/// Decide what a billing run does for one confirmed booking
pub fn decide(
    booking: &Booking,
    price_per_month: i64,
    payments: &[Payment],
    today: NaiveDate,
) -> CycleDecision {
    if payments.iter().any(|p| p.status.is_open()) {
        return CycleDecision::OpenBillExists;
    }
    if price_per_month <= 0 {
        return CycleDecision::NoPrice;
    }

    let confirmed_months = payments.iter().filter(|p| p.status.is_paid()).count();
    let Some(paid_until) = u32::try_from(confirmed_months)
        .ok()
        .and_then(|m| booking.start_date.checked_add_months(Months::new(m)))
    else {
        return CycleDecision::OutOfRange;
    };

    let bill_from = paid_until
        .checked_sub_days(Days::new(BILLING_LEAD_DAYS))
        .unwrap_or(paid_until);
    if today < bill_from {
        return CycleDecision::NotDue { paid_until };
    }

    let remind_on = paid_until
        .checked_sub_days(Days::new(REMINDER_LEAD_DAYS))
        .unwrap_or(paid_until);

    CycleDecision::Bill {
        due_date: paid_until,
        reminder_date: remind_on.max(today),
    }
}

/// Counts for one billing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillingReport {
    pub examined: usize,
    pub billed: usize,
    pub skipped_open_bill: usize,
    pub skipped_no_price: usize,
    pub not_due: usize,
    pub failed: usize,
}

pub struct BillingCycleGenerator {
    store: Arc<dyn Store>,
}

enum Billed {
    Created,
    Skipped(CycleDecision),
    /// Left the Confirmed state since the run started
    Inactive,
}

impl BillingCycleGenerator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Run over all confirmed bookings. Per-booking failures are logged and
    /// counted, never propagated.
    pub async fn run(&self, now: DateTime<Utc>) -> ApiResult<BillingReport> {
        let today = now.date_naive();
        let booking_ids: Vec<Uuid> = {
            let mut uow = self.store.begin().await?;
            uow.bookings_with_status(BookingStatus::Confirmed)
                .await?
                .into_iter()
                .map(|b| b.id)
                .collect()
        };

        let mut report = BillingReport {
            examined: booking_ids.len(),
            ..Default::default()
        };

        for booking_id in booking_ids {
            match self.bill_booking(booking_id, today).await {
                Ok(Billed::Created) => report.billed += 1,
                Ok(Billed::Skipped(CycleDecision::OpenBillExists)) => {
                    report.skipped_open_bill += 1
                }
                Ok(Billed::Skipped(CycleDecision::NoPrice)) => report.skipped_no_price += 1,
                Ok(Billed::Skipped(_)) | Ok(Billed::Inactive) => report.not_due += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(booking_id = %booking_id, error = %e, "Failed to generate bill");
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            billed = report.billed,
            skipped_open_bill = report.skipped_open_bill,
            skipped_no_price = report.skipped_no_price,
            not_due = report.not_due,
            failed = report.failed,
            "Billing cycle completed"
        );
        Ok(report)
    }

    async fn bill_booking(&self, booking_id: Uuid, today: NaiveDate) -> ApiResult<Billed> {
        let mut uow = self.store.begin().await?;

        let booking = uow
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| ApiError::not_found("booking", booking_id))?;
        if booking.status != BookingStatus::Confirmed {
            return Ok(Billed::Inactive);
        }

        let Some(room) = uow.find_room(booking.room_id).await? else {
            tracing::warn!(booking_id = %booking_id, room_id = %booking.room_id, "Room missing, cannot price bill");
            return Ok(Billed::Skipped(CycleDecision::NoPrice));
        };

        let payments = uow.payments_for_booking(booking_id).await?;
        let (due_date, reminder_date) = match decide(&booking, room.price_per_month, &payments, today) {
            CycleDecision::Bill {
                due_date,
                reminder_date,
            } => (due_date, reminder_date),
            CycleDecision::OutOfRange => {
                return Err(ApiError::Validation(format!(
                    "paid-up date of booking {} is out of range",
                    booking_id
                )))
            }
            skipped => return Ok(Billed::Skipped(skipped)),
        };

        let payment = uow
            .insert_payment(NewPayment {
                booking_id,
                amount: room.price_per_month,
                dp_amount: 0,
                status: PaymentStatus::Pending,
                method: PaymentMethod::Cash,
                kind: PaymentType::Extend,
                due_date: Some(due_date),
                external_order_id: None,
                gateway_token: None,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => ApiError::OpenBillExists,
                other => other.into(),
            })?;

        uow.insert_reminder(NewReminder {
            payment_id: payment.id,
            amount: payment.amount,
            reminder_date,
        })
        .await?;

        uow.commit().await?;

        tracing::info!(
            booking_id = %booking_id,
            payment_id = %payment.id,
            due_date = %due_date,
            reminder_date = %reminder_date,
            "Extend bill created"
        );
        Ok(Billed::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(start: NaiveDate) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            start_date: start,
            duration_months: 1,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    fn payment(booking: &Booking, status: PaymentStatus) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            amount: 1_000_000,
            dp_amount: 0,
            status,
            method: PaymentMethod::Cash,
            kind: PaymentType::Full,
            due_date: None,
            paid_at: None,
            external_order_id: None,
            gateway_token: None,
            proof_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_bill_week_before_paid_until() {
        let b = booking(date(2026, 4, 1));
        let paid = vec![payment(&b, PaymentStatus::Confirmed)];

        assert_eq!(
            decide(&b, 1_000_000, &paid, date(2026, 4, 24)),
            CycleDecision::Bill {
                due_date: date(2026, 5, 1),
                reminder_date: date(2026, 4, 28),
            }
        );
        assert_eq!(
            decide(&b, 1_000_000, &paid, date(2026, 4, 23)),
            CycleDecision::NotDue {
                paid_until: date(2026, 5, 1)
            }
        );
    }

    #[test]
    fn test_late_run_reminds_today() {
        let b = booking(date(2026, 4, 1));
        let paid = vec![payment(&b, PaymentStatus::Settled)];

        assert_eq!(
            decide(&b, 1_000_000, &paid, date(2026, 5, 3)),
            CycleDecision::Bill {
                due_date: date(2026, 5, 1),
                reminder_date: date(2026, 5, 3),
            }
        );
    }

    #[test]
    fn test_open_bill_and_price_skips() {
        let b = booking(date(2026, 4, 1));
        let payments = vec![
            payment(&b, PaymentStatus::Confirmed),
            payment(&b, PaymentStatus::Rejected),
        ];
        assert_eq!(
            decide(&b, 1_000_000, &payments, date(2026, 4, 30)),
            CycleDecision::OpenBillExists
        );

        let paid = vec![payment(&b, PaymentStatus::Confirmed)];
        assert_eq!(decide(&b, 0, &paid, date(2026, 4, 30)), CycleDecision::NoPrice);
    }

    #[test]
    fn test_failed_payments_do_not_count_as_months() {
        let b = booking(date(2026, 1, 31));
        let payments = vec![
            payment(&b, PaymentStatus::Confirmed),
            payment(&b, PaymentStatus::Failed),
        ];
        // Jan 31 + 1 month clamps to Feb 28
        assert_eq!(
            decide(&b, 1_000_000, &payments, date(2026, 2, 21)),
            CycleDecision::Bill {
                due_date: date(2026, 2, 28),
                reminder_date: date(2026, 2, 25),
            }
        );
    }
}
