use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, Payment, PaymentType, Room};

/// Sentinel token stored on cash payments
pub const CASH_PAYMENT_TOKEN: &str = "CASH_PAYMENT";

/// Share of the total charged up front for a down payment, in percent
pub const DP_PERCENT: i64 = 30;

/// Amounts for a new payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub total: i64,
    /// Charged now
    pub amount: i64,
    pub dp_amount: i64,
    /// Billed later by reminder (down payments only)
    pub remainder: i64,
}

fn amount_out_of_range(price_per_month: i64, months: i32) -> ApiError {
    ApiError::Validation(format!(
        "{} months at {} per month is out of range",
        months, price_per_month
    ))
}

/// Price a payment. Fails with `Validation` when the total overflows.
pub fn quote(price_per_month: i64, months: i32, kind: PaymentType) -> ApiResult<Quote> {
    let total = price_per_month
        .checked_mul(i64::from(months))
        .ok_or_else(|| amount_out_of_range(price_per_month, months))?;
    let quote = match kind {
        PaymentType::Dp => {
            let dp_amount = total
                .checked_mul(DP_PERCENT)
                .ok_or_else(|| amount_out_of_range(price_per_month, months))?
                / 100;
            Quote {
                total,
                amount: dp_amount,
                dp_amount,
                remainder: total - dp_amount,
            }
        }
        PaymentType::Full | PaymentType::Extend => Quote {
            total,
            amount: total,
            dp_amount: 0,
            remainder: 0,
        },
    };
    Ok(quote)
}

/// An opened payment and where to pay it
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub payment: Payment,
    pub token: String,
    pub redirect_url: Option<String>,
}

/// `KOS-<uuid>` order id sent to the gateway
pub fn new_order_id() -> String {
    format!("KOS-{}", Uuid::new_v4().simple())
}

/// Result of applying a payment outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Applied,
    /// The payment was already in the requested (or a stronger) state
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Cash or manual confirmation
    Confirmed { proof_url: Option<String> },
    /// Gateway settlement
    Settled,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub transition: Transition,
    pub payment: Payment,
    /// Present when the cascade reached the booking
    pub booking: Option<Booking>,
    /// Present when the cascade reached the room
    pub room: Option<Room>,
}

impl Settlement {
    pub(crate) fn unchanged(payment: Payment) -> Self {
        Self {
            transition: Transition::Unchanged,
            payment,
            booking: None,
            room: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_full() {
        let q = quote(1_000_000, 3, PaymentType::Full).unwrap();
        assert_eq!(q.total, 3_000_000);
        assert_eq!(q.amount, 3_000_000);
        assert_eq!(q.dp_amount, 0);
        assert_eq!(q.remainder, 0);
    }

    #[test]
    fn test_quote_down_payment() {
        let q = quote(1_000_000, 3, PaymentType::Dp).unwrap();
        assert_eq!(q.amount, 900_000);
        assert_eq!(q.dp_amount, 900_000);
        assert_eq!(q.remainder, 2_100_000);
    }

    #[test]
    fn test_quote_down_payment_rounds_down() {
        let q = quote(333_333, 1, PaymentType::Dp).unwrap();
        assert_eq!(q.amount, 99_999);
        assert_eq!(q.amount + q.remainder, q.total);
    }

    #[test]
    fn test_quote_overflow_is_rejected() {
        let err = quote(i64::MAX / 2, 3, PaymentType::Full).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // Total fits, the down-payment share does not
        let err = quote(i64::MAX / 20, 1, PaymentType::Dp).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_order_id_format() {
        let id = new_order_id();
        assert!(id.starts_with("KOS-"));
        assert_eq!(id.len(), 4 + 32);
    }
}
