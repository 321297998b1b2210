//! Persistence boundary
//!
//! Every engine operation works through a [`UnitOfWork`] obtained from
//! [`Store::begin`]. Changes become visible only on [`UnitOfWork::commit`];
//! dropping an uncommitted unit of work (early return, error, panic) rolls it
//! back.

mod memory;
mod postgres;

pub use memory::{Entity, MemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus, PaymentType, Reminder, Room,
    TenantContact,
};

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A status-scoped uniqueness rule was violated
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Insert payload for a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub tenant_id: Uuid,
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub duration_months: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub amount: i64,
    pub dp_amount: i64,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub kind: PaymentType,
    pub due_date: Option<NaiveDate>,
    pub external_order_id: Option<String>,
    pub gateway_token: Option<String>,
}

/// Insert payload for a reminder
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub payment_id: Uuid,
    pub amount: i64,
    pub reminder_date: NaiveDate,
}

#[async_trait]
pub trait RoomRepository: Send {
    async fn find_room(&mut self, id: Uuid) -> Result<Option<Room>, StoreError>;

    async fn save_room(&mut self, room: &Room) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BookingRepository: Send {
    async fn find_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Load a booking and hold its row lock until the unit of work ends
    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Serialize all booking creation for one tenant until the unit of work ends
    async fn lock_tenant(&mut self, tenant_id: Uuid) -> Result<(), StoreError>;

    /// Newest first
    async fn bookings_for_tenant(&mut self, tenant_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    async fn bookings_with_status(
        &mut self,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn pending_bookings_created_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError>;

    async fn save_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PaymentRepository: Send {
    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError>;

    /// Load a payment and hold its row lock until the unit of work ends
    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn find_payment_by_order_id(
        &mut self,
        order_id: &str,
    ) -> Result<Option<Payment>, StoreError>;

    /// Oldest first
    async fn payments_for_booking(&mut self, booking_id: Uuid)
        -> Result<Vec<Payment>, StoreError>;

    /// Newest first
    async fn list_payments(&mut self) -> Result<Vec<Payment>, StoreError>;

    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment, StoreError>;

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ReminderRepository: Send {
    async fn find_reminder(&mut self, id: Uuid) -> Result<Option<Reminder>, StoreError>;

    async fn reminders_for_payment(
        &mut self,
        payment_id: Uuid,
    ) -> Result<Vec<Reminder>, StoreError>;

    /// Pending, unsent reminders dated on or before `today`
    async fn due_reminders(&mut self, today: NaiveDate) -> Result<Vec<Reminder>, StoreError>;

    /// Pending reminders ordered by reminder date
    async fn pending_reminders(&mut self) -> Result<Vec<Reminder>, StoreError>;

    /// Reminders on any of the tenant's payments, ordered by reminder date
    async fn reminders_for_tenant(&mut self, tenant_id: Uuid)
        -> Result<Vec<Reminder>, StoreError>;

    async fn insert_reminder(&mut self, reminder: NewReminder) -> Result<Reminder, StoreError>;

    async fn save_reminder(&mut self, reminder: &Reminder) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TenantRepository: Send {
    async fn find_tenant_contact(
        &mut self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantContact>, StoreError>;
}

/// Transaction-scoped handle over every entity repository
#[async_trait]
pub trait UnitOfWork:
    RoomRepository + BookingRepository + PaymentRepository + ReminderRepository + TenantRepository
{
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Entry point to persistence
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}
