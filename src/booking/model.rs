use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{Booking, Payment, PaymentStatus, Room};

/// Calendar format accepted for booking start dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_start_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::InvalidDate(raw.to_string()))
}

/// A tenant's booking with its room and payment history
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    #[serde(flatten)]
    pub booking: Booking,
    pub room: Option<Room>,
    /// Oldest first
    pub payments: Vec<Payment>,
    /// Sum of confirmed and settled payments
    pub total_paid: i64,
    pub last_payment_status: Option<PaymentStatus>,
}

impl BookingSummary {
    pub fn new(booking: Booking, room: Option<Room>, payments: Vec<Payment>) -> Self {
        let total_paid = payments
            .iter()
            .filter(|p| p.status.is_paid())
            .map(|p| p.amount)
            .sum();
        let last_payment_status = payments.last().map(|p| p.status);

        Self {
            booking,
            room,
            payments,
            total_paid,
            last_payment_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_date() {
        assert_eq!(
            parse_start_date("2026-04-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
        );
        assert!(matches!(
            parse_start_date("01/04/2026"),
            Err(ApiError::InvalidDate(_))
        ));
        assert!(matches!(
            parse_start_date("2026-02-30"),
            Err(ApiError::InvalidDate(_))
        ));
    }
}
