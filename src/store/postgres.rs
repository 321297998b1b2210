//! Postgres-backed store
//!
//! One `sqlx::Transaction` per unit of work. Dropping the transaction without
//! committing rolls it back.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    BookingRepository, NewBooking, NewPayment, NewReminder, PaymentRepository, ReminderRepository,
    RoomRepository, Store, StoreError, TenantRepository, UnitOfWork,
};
use crate::models::{Booking, BookingStatus, Payment, Reminder, ReminderStatus, Room, TenantContact};

/// Store over a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.db_pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

/// Surface partial-unique-index violations as conflicts
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl RoomRepository for PgUnitOfWork {
    async fn find_room(&mut self, id: Uuid) -> Result<Option<Room>, StoreError> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(room)
    }

    async fn save_room(&mut self, room: &Room) -> Result<(), StoreError> {
        sqlx::query("UPDATE rooms SET number = $1, price_per_month = $2, status = $3 WHERE id = $4")
            .bind(&room.number)
            .bind(room.price_per_month)
            .bind(room.status)
            .bind(room.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for PgUnitOfWork {
    async fn find_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(booking)
    }

    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let booking =
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(booking)
    }

    async fn lock_tenant(&mut self, tenant_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::uuid::text, 0))")
            .bind(tenant_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn bookings_for_tenant(&mut self, tenant_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(bookings)
    }

    async fn bookings_with_status(
        &mut self,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(bookings)
    }

    async fn pending_bookings_created_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(bookings)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, tenant_id, room_id, start_date, duration_months, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.tenant_id)
        .bind(booking.room_id)
        .bind(booking.start_date)
        .bind(booking.duration_months)
        .bind(booking.status)
        .bind(booking.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        Ok(booking)
    }

    async fn save_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET room_id = $1, start_date = $2, duration_months = $3, status = $4
            WHERE id = $5
            "#,
        )
        .bind(booking.room_id)
        .bind(booking.start_date)
        .bind(booking.duration_months)
        .bind(booking.status)
        .bind(booking.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PgUnitOfWork {
    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(payment)
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(payment)
    }

    async fn find_payment_by_order_id(
        &mut self,
        order_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE external_order_id = $1")
                .bind(order_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(payment)
    }

    async fn payments_for_booking(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Vec<Payment>, StoreError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at ASC",
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(payments)
    }

    async fn list_payments(&mut self) -> Result<Vec<Payment>, StoreError> {
        let payments =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY created_at DESC")
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(payments)
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment, StoreError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, booking_id, amount, dp_amount, status, method, payment_type,
                due_date, external_order_id, gateway_token, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(payment.dp_amount)
        .bind(payment.status)
        .bind(payment.method)
        .bind(payment.kind)
        .bind(payment.due_date)
        .bind(payment.external_order_id)
        .bind(payment.gateway_token)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        Ok(payment)
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE payments
            SET amount = $1, dp_amount = $2, status = $3, due_date = $4, paid_at = $5,
                external_order_id = $6, gateway_token = $7, proof_url = $8
            WHERE id = $9
            "#,
        )
        .bind(payment.amount)
        .bind(payment.dp_amount)
        .bind(payment.status)
        .bind(payment.due_date)
        .bind(payment.paid_at)
        .bind(&payment.external_order_id)
        .bind(&payment.gateway_token)
        .bind(&payment.proof_url)
        .bind(payment.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }
}

#[async_trait]
impl ReminderRepository for PgUnitOfWork {
    async fn find_reminder(&mut self, id: Uuid) -> Result<Option<Reminder>, StoreError> {
        let reminder = sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(reminder)
    }

    async fn reminders_for_payment(
        &mut self,
        payment_id: Uuid,
    ) -> Result<Vec<Reminder>, StoreError> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE payment_id = $1 ORDER BY reminder_date ASC",
        )
        .bind(payment_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(reminders)
    }

    async fn due_reminders(&mut self, today: NaiveDate) -> Result<Vec<Reminder>, StoreError> {
        let reminders = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT * FROM reminders
            WHERE status = $1 AND sent = FALSE AND reminder_date <= $2
            ORDER BY reminder_date ASC
            "#,
        )
        .bind(ReminderStatus::Pending)
        .bind(today)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(reminders)
    }

    async fn pending_reminders(&mut self) -> Result<Vec<Reminder>, StoreError> {
        let reminders = sqlx::query_as::<_, Reminder>(
            "SELECT * FROM reminders WHERE status = $1 ORDER BY reminder_date ASC",
        )
        .bind(ReminderStatus::Pending)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(reminders)
    }

    async fn reminders_for_tenant(
        &mut self,
        tenant_id: Uuid,
    ) -> Result<Vec<Reminder>, StoreError> {
        let reminders = sqlx::query_as::<_, Reminder>(
            r#"
            SELECT r.* FROM reminders r
            JOIN payments p ON p.id = r.payment_id
            JOIN bookings b ON b.id = p.booking_id
            WHERE b.tenant_id = $1
            ORDER BY r.reminder_date ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(reminders)
    }

    async fn insert_reminder(&mut self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        let reminder = sqlx::query_as::<_, Reminder>(
            r#"
            INSERT INTO reminders (id, payment_id, amount, reminder_date, status, sent, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reminder.payment_id)
        .bind(reminder.amount)
        .bind(reminder.reminder_date)
        .bind(ReminderStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        Ok(reminder)
    }

    async fn save_reminder(&mut self, reminder: &Reminder) -> Result<(), StoreError> {
        sqlx::query("UPDATE reminders SET amount = $1, reminder_date = $2, status = $3, sent = $4 WHERE id = $5")
            .bind(reminder.amount)
            .bind(reminder.reminder_date)
            .bind(reminder.status)
            .bind(reminder.sent)
            .bind(reminder.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }
}

#[async_trait]
impl TenantRepository for PgUnitOfWork {
    async fn find_tenant_contact(
        &mut self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantContact>, StoreError> {
        let contact = sqlx::query_as::<_, TenantContact>(
            "SELECT id, full_name, email, phone FROM tenants WHERE id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(contact)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_write_error)
    }
}
