//! Payment session manager - opens payment intents

use chrono::{Days, Months};
use sqlx::types::chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::model::{new_order_id, quote, PaymentSession, CASH_PAYMENT_TOKEN};
use crate::error::{ApiError, ApiResult};
use crate::gateway::{Customer, OrderContext, PaymentGateway};
use crate::models::{
    Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus, PaymentType, Principal,
};
use crate::store::{NewPayment, NewReminder, Store, StoreError, UnitOfWork};

/// Days after opening a down payment until the remainder reminder fires
const DP_REMAINDER_REMINDER_DAYS: u64 = 30;

/// Payment session service
pub struct PaymentSessionService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
}

struct Draft {
    booking: Booking,
    kind: PaymentType,
    method: PaymentMethod,
    amount: i64,
    dp_amount: i64,
    remainder: i64,
    due_date: Option<chrono::NaiveDate>,
    order: OrderContext,
}

/// Fail with `OpenBillExists` if the booking already has an open payment
async fn ensure_no_open_bill(uow: &mut dyn UnitOfWork, booking_id: Uuid) -> ApiResult<()> {
    let payments = uow.payments_for_booking(booking_id).await?;
    if payments.iter().any(|p| p.status.is_open()) {
        return Err(ApiError::OpenBillExists);
    }
    Ok(())
}

fn ensure_payable(booking: &Booking) -> ApiResult<()> {
    if booking.status == BookingStatus::Cancelled {
        return Err(ApiError::Validation(format!(
            "booking {} is cancelled",
            booking.id
        )));
    }
    Ok(())
}

fn open_bill_conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(_) => ApiError::OpenBillExists,
        other => other.into(),
    }
}

impl PaymentSessionService {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Open a full or down payment covering the booking's whole duration
    pub async fn create_session(
        &self,
        booking_id: Uuid,
        kind: PaymentType,
        method: PaymentMethod,
        requester: &Principal,
    ) -> ApiResult<PaymentSession> {
        if kind == PaymentType::Extend {
            return Err(ApiError::Validation(
                "extension payments are opened through the booking".to_string(),
            ));
        }
        self.open(booking_id, None, kind, method, Some(requester)).await
    }

    /// Open an extension payment for `months` more months.
    ///
    /// Ownership is checked by the caller.
    pub async fn open_extension(
        &self,
        booking_id: Uuid,
        months: i32,
        method: PaymentMethod,
    ) -> ApiResult<PaymentSession> {
        if months < 1 {
            return Err(ApiError::Validation(
                "extension must be at least one month".to_string(),
            ));
        }
        self.open(booking_id, Some(months), PaymentType::Extend, method, None)
            .await
    }

    async fn open(
        &self,
        booking_id: Uuid,
        months: Option<i32>,
        kind: PaymentType,
        method: PaymentMethod,
        requester: Option<&Principal>,
    ) -> ApiResult<PaymentSession> {
        let draft = self
            .draft(booking_id, months, kind, method, requester)
            .await?;

        let (token, redirect_url, order_id) = match method {
            PaymentMethod::Cash => (CASH_PAYMENT_TOKEN.to_string(), None, None),
            PaymentMethod::Gateway => {
                let session = self
                    .gateway
                    .create_session(&draft.order, draft.amount)
                    .await?;
                (
                    session.token,
                    Some(session.redirect_url),
                    Some(draft.order.order_id.clone()),
                )
            }
        };

        let payment = self.persist(&draft, token.clone(), order_id).await;
        let payment = match payment {
            Ok(payment) => payment,
            Err(e) => {
                if method == PaymentMethod::Gateway {
                    tracing::warn!(
                        order_id = %draft.order.order_id,
                        error = %e,
                        "Gateway session opened but payment not recorded"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            payment_id = %payment.id,
            booking_id = %booking_id,
            amount = payment.amount,
            kind = ?kind,
            method = ?method,
            "Payment session opened"
        );

        Ok(PaymentSession {
            payment,
            token,
            redirect_url,
        })
    }

    /// Validate and price the payment without writing anything
    async fn draft(
        &self,
        booking_id: Uuid,
        months: Option<i32>,
        kind: PaymentType,
        method: PaymentMethod,
        requester: Option<&Principal>,
    ) -> ApiResult<Draft> {
        let mut uow = self.store.begin().await?;

        let booking = uow
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| ApiError::not_found("booking", booking_id))?;

        if let Some(requester) = requester {
            if !requester.owns(&booking) && !requester.is_admin() {
                return Err(ApiError::Unauthorized(
                    "you can only pay for your own bookings".to_string(),
                ));
            }
        }
        ensure_payable(&booking)?;

        let room = uow
            .find_room(booking.room_id)
            .await?
            .ok_or_else(|| ApiError::not_found("room", booking.room_id))?;

        ensure_no_open_bill(uow.as_mut(), booking_id).await?;

        let tenant = uow.find_tenant_contact(booking.tenant_id).await?;

        let months = months.unwrap_or(booking.duration_months);
        let priced = quote(room.price_per_month, months, kind)?;
        if priced.amount <= 0 {
            return Err(ApiError::Validation(format!(
                "room {} has no positive price",
                room.number
            )));
        }

        let due_date = match kind {
            PaymentType::Dp => booking.start_date.checked_add_months(Months::new(1)),
            _ => None,
        };

        let order = OrderContext {
            order_id: new_order_id(),
            booking_id,
            room_id: room.id,
            item_name: format!("Sewa kamar {} ({} bulan)", room.number, months),
            customer: tenant.map(|t| Customer {
                name: t.full_name,
                email: t.email,
                phone: t.phone,
            }),
        };

        Ok(Draft {
            booking,
            kind,
            method,
            amount: priced.amount,
            dp_amount: priced.dp_amount,
            remainder: priced.remainder,
            due_date,
            order,
        })
    }

    /// Insert under the booking row lock, re-checking what `draft` saw
    async fn persist(
        &self,
        draft: &Draft,
        token: String,
        order_id: Option<String>,
    ) -> ApiResult<Payment> {
        let mut uow = self.store.begin().await?;

        let booking = uow
            .lock_booking(draft.booking.id)
            .await?
            .ok_or_else(|| ApiError::not_found("booking", draft.booking.id))?;
        ensure_payable(&booking)?;
        ensure_no_open_bill(uow.as_mut(), booking.id).await?;

        let payment = uow
            .insert_payment(NewPayment {
                booking_id: booking.id,
                amount: draft.amount,
                dp_amount: draft.dp_amount,
                status: PaymentStatus::Pending,
                method: draft.method,
                kind: draft.kind,
                due_date: draft.due_date,
                external_order_id: order_id,
                gateway_token: Some(token),
            })
            .await
            .map_err(open_bill_conflict)?;

        if draft.kind == PaymentType::Dp && draft.remainder > 0 {
            let reminder_date = Utc::now().date_naive() + Days::new(DP_REMAINDER_REMINDER_DAYS);
            uow.insert_reminder(NewReminder {
                payment_id: payment.id,
                amount: draft.remainder,
                reminder_date,
            })
            .await?;
        }

        uow.commit().await.map_err(open_bill_conflict)?;
        Ok(payment)
    }

    /// Record a transfer proof on an open payment owned by the requester
    pub async fn attach_proof(
        &self,
        payment_id: Uuid,
        proof_url: String,
        requester: &Principal,
    ) -> ApiResult<Payment> {
        let mut uow = self.store.begin().await?;

        let mut payment = uow
            .lock_payment(payment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("payment", payment_id))?;

        let booking = uow
            .find_booking(payment.booking_id)
            .await?
            .ok_or_else(|| ApiError::not_found("booking", payment.booking_id))?;
        if !requester.owns(&booking) {
            return Err(ApiError::Unauthorized(
                "you can only upload proof for your own payments".to_string(),
            ));
        }

        if !payment.status.is_open() {
            return Err(ApiError::Validation(format!(
                "payment {} is no longer open",
                payment_id
            )));
        }

        // A fresh proof puts a rejected payment back in the review queue
        payment.proof_url = Some(proof_url);
        payment.status = PaymentStatus::Pending;
        uow.save_payment(&payment).await?;
        uow.commit().await?;

        tracing::info!(payment_id = %payment_id, "Payment proof attached");
        Ok(payment)
    }

    /// All payments, newest first
    pub async fn list_payments(&self) -> ApiResult<Vec<Payment>> {
        let mut uow = self.store.begin().await?;
        Ok(uow.list_payments().await?)
    }
}
