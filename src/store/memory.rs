//! In-process store used by tests and local runs
//!
//! A unit of work holds the store mutex for its whole lifetime, so units of work
//! are fully serialized. Changes are staged on a copy of the state and swapped in
//! on commit.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    BookingRepository, NewBooking, NewPayment, NewReminder, PaymentRepository, ReminderRepository,
    RoomRepository, Store, StoreError, TenantRepository, UnitOfWork,
};
use crate::models::{
    Booking, BookingStatus, Payment, Reminder, ReminderStatus, Room, TenantContact,
};

/// Entity kinds whose writes can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Room,
    Booking,
    Payment,
    Reminder,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    // Insertion order doubles as creation order
    rooms: Vec<Room>,
    bookings: Vec<Booking>,
    payments: Vec<Payment>,
    reminders: Vec<Reminder>,
    tenants: Vec<TenantContact>,
    failing: HashSet<Entity>,
}

impl MemoryState {
    fn check_writable(&self, entity: Entity) -> Result<(), StoreError> {
        if self.failing.contains(&entity) {
            return Err(StoreError::Unavailable(format!("{:?} writes are failing", entity)));
        }
        Ok(())
    }

    fn active_booking_clash(&self, booking_id: Uuid, tenant_id: Uuid) -> bool {
        self.bookings
            .iter()
            .any(|b| b.id != booking_id && b.tenant_id == tenant_id && b.is_active())
    }

    fn open_bill_clash(&self, payment_id: Uuid, booking_id: Uuid) -> bool {
        self.payments
            .iter()
            .any(|p| p.id != payment_id && p.booking_id == booking_id && p.status.is_open())
    }
}

/// Mutex-guarded in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room (rooms are managed outside the engine)
    pub async fn put_room(&self, room: Room) {
        let mut state = self.state.lock().await;
        state.rooms.retain(|r| r.id != room.id);
        state.rooms.push(room);
    }

    /// Register a tenant's contact details
    pub async fn put_tenant(&self, contact: TenantContact) {
        let mut state = self.state.lock().await;
        state.tenants.retain(|t| t.id != contact.id);
        state.tenants.push(contact);
    }

    /// Make every subsequent write to `entity` fail until [`MemoryStore::heal`]
    pub async fn fail_writes(&self, entity: Entity) {
        self.state.lock().await.failing.insert(entity);
    }

    pub async fn heal(&self) {
        self.state.lock().await.failing.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl RoomRepository for MemoryUnitOfWork {
    async fn find_room(&mut self, id: Uuid) -> Result<Option<Room>, StoreError> {
        Ok(self.staged.rooms.iter().find(|r| r.id == id).cloned())
    }

    async fn save_room(&mut self, room: &Room) -> Result<(), StoreError> {
        self.staged.check_writable(Entity::Room)?;
        match self.staged.rooms.iter_mut().find(|r| r.id == room.id) {
            Some(existing) => {
                *existing = room.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!("room {} does not exist", room.id))),
        }
    }
}

#[async_trait]
impl BookingRepository for MemoryUnitOfWork {
    async fn find_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.staged.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn lock_booking(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        // The unit of work already holds the whole store
        self.find_booking(id).await
    }

    async fn lock_tenant(&mut self, _tenant_id: Uuid) -> Result<(), StoreError> {
        Ok(())
    }

    async fn bookings_for_tenant(&mut self, tenant_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .staged
            .bookings
            .iter()
            .rev()
            .filter(|b| b.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn bookings_with_status(
        &mut self,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .staged
            .bookings
            .iter()
            .filter(|b| b.status == status)
            .cloned()
            .collect())
    }

    async fn pending_bookings_created_before(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .staged
            .bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<Booking, StoreError> {
        self.staged.check_writable(Entity::Booking)?;
        let booking = Booking {
            id: Uuid::new_v4(),
            tenant_id: booking.tenant_id,
            room_id: booking.room_id,
            start_date: booking.start_date,
            duration_months: booking.duration_months,
            status: booking.status,
            created_at: booking.created_at,
        };
        if booking.is_active() && self.staged.active_booking_clash(booking.id, booking.tenant_id) {
            return Err(StoreError::Conflict(
                "bookings_one_active_per_tenant".to_string(),
            ));
        }
        self.staged.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn save_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        self.staged.check_writable(Entity::Booking)?;
        if booking.is_active() && self.staged.active_booking_clash(booking.id, booking.tenant_id) {
            return Err(StoreError::Conflict(
                "bookings_one_active_per_tenant".to_string(),
            ));
        }
        match self.staged.bookings.iter_mut().find(|b| b.id == booking.id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!(
                "booking {} does not exist",
                booking.id
            ))),
        }
    }
}

#[async_trait]
impl PaymentRepository for MemoryUnitOfWork {
    async fn find_payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.staged.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        self.find_payment(id).await
    }

    async fn find_payment_by_order_id(
        &mut self,
        order_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .staged
            .payments
            .iter()
            .find(|p| p.external_order_id.as_deref() == Some(order_id))
            .cloned())
    }

    async fn payments_for_booking(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .staged
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn list_payments(&mut self) -> Result<Vec<Payment>, StoreError> {
        Ok(self.staged.payments.iter().rev().cloned().collect())
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment, StoreError> {
        self.staged.check_writable(Entity::Payment)?;
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: payment.booking_id,
            amount: payment.amount,
            dp_amount: payment.dp_amount,
            status: payment.status,
            method: payment.method,
            kind: payment.kind,
            due_date: payment.due_date,
            paid_at: None,
            external_order_id: payment.external_order_id,
            gateway_token: payment.gateway_token,
            proof_url: None,
            created_at: Utc::now(),
        };
        if payment.status.is_open() && self.staged.open_bill_clash(payment.id, payment.booking_id) {
            return Err(StoreError::Conflict(
                "payments_one_open_per_booking".to_string(),
            ));
        }
        self.staged.payments.push(payment.clone());
        Ok(payment)
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        self.staged.check_writable(Entity::Payment)?;
        if payment.status.is_open() && self.staged.open_bill_clash(payment.id, payment.booking_id) {
            return Err(StoreError::Conflict(
                "payments_one_open_per_booking".to_string(),
            ));
        }
        match self.staged.payments.iter_mut().find(|p| p.id == payment.id) {
            Some(existing) => {
                *existing = payment.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!(
                "payment {} does not exist",
                payment.id
            ))),
        }
    }
}

#[async_trait]
impl ReminderRepository for MemoryUnitOfWork {
    async fn find_reminder(&mut self, id: Uuid) -> Result<Option<Reminder>, StoreError> {
        Ok(self.staged.reminders.iter().find(|r| r.id == id).cloned())
    }

    async fn reminders_for_payment(
        &mut self,
        payment_id: Uuid,
    ) -> Result<Vec<Reminder>, StoreError> {
        Ok(self
            .staged
            .reminders
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .cloned()
            .collect())
    }

    async fn due_reminders(&mut self, today: NaiveDate) -> Result<Vec<Reminder>, StoreError> {
        Ok(self
            .staged
            .reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Pending && !r.sent && r.reminder_date <= today)
            .cloned()
            .collect())
    }

    async fn pending_reminders(&mut self) -> Result<Vec<Reminder>, StoreError> {
        let mut reminders: Vec<Reminder> = self
            .staged
            .reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Pending)
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.reminder_date);
        Ok(reminders)
    }

    async fn reminders_for_tenant(
        &mut self,
        tenant_id: Uuid,
    ) -> Result<Vec<Reminder>, StoreError> {
        let state = &self.staged;
        let mut reminders: Vec<Reminder> = state
            .reminders
            .iter()
            .filter(|r| {
                state
                    .payments
                    .iter()
                    .find(|p| p.id == r.payment_id)
                    .and_then(|p| state.bookings.iter().find(|b| b.id == p.booking_id))
                    .map_or(false, |b| b.tenant_id == tenant_id)
            })
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.reminder_date);
        Ok(reminders)
    }

    async fn insert_reminder(&mut self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        self.staged.check_writable(Entity::Reminder)?;
        let reminder = Reminder {
            id: Uuid::new_v4(),
            payment_id: reminder.payment_id,
            amount: reminder.amount,
            reminder_date: reminder.reminder_date,
            status: ReminderStatus::Pending,
            sent: false,
            created_at: Utc::now(),
        };
        self.staged.reminders.push(reminder.clone());
        Ok(reminder)
    }

    async fn save_reminder(&mut self, reminder: &Reminder) -> Result<(), StoreError> {
        self.staged.check_writable(Entity::Reminder)?;
        match self.staged.reminders.iter_mut().find(|r| r.id == reminder.id) {
            Some(existing) => {
                *existing = reminder.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!(
                "reminder {} does not exist",
                reminder.id
            ))),
        }
    }
}

#[async_trait]
impl TenantRepository for MemoryUnitOfWork {
    async fn find_tenant_contact(
        &mut self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantContact>, StoreError> {
        Ok(self.staged.tenants.iter().find(|t| t.id == tenant_id).cloned())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoomStatus;
    use chrono::NaiveDate;

    fn room() -> Room {
        Room {
            id: Uuid::new_v4(),
            number: "A1".to_string(),
            price_per_month: 1_000_000,
            status: RoomStatus::Available,
        }
    }

    fn new_booking(tenant_id: Uuid, room_id: Uuid) -> NewBooking {
        NewBooking {
            tenant_id,
            room_id,
            start_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            duration_months: 1,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_work_is_discarded() {
        let store = MemoryStore::new();
        let room = room();
        store.put_room(room.clone()).await;

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_booking(new_booking(Uuid::new_v4(), room.id))
                .await
                .unwrap();
            // dropped without commit
        }

        let mut uow = store.begin().await.unwrap();
        let pending = uow
            .bookings_with_status(BookingStatus::Pending)
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();

        let mut uow = store.begin().await.unwrap();
        let booking = uow
            .insert_booking(new_booking(tenant, Uuid::new_v4()))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.find_booking(booking.id).await.unwrap(), Some(booking));
    }

    #[tokio::test]
    async fn test_second_active_booking_violates_uniqueness() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();

        let mut uow = store.begin().await.unwrap();
        uow.insert_booking(new_booking(tenant, Uuid::new_v4()))
            .await
            .unwrap();
        let err = uow
            .insert_booking(new_booking(tenant, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryStore::new();
        let room = room();
        store.put_room(room.clone()).await;
        store.fail_writes(Entity::Room).await;

        let mut uow = store.begin().await.unwrap();
        let mut loaded = uow.find_room(room.id).await.unwrap().unwrap();
        loaded.status = RoomStatus::Full;
        assert!(matches!(
            uow.save_room(&loaded).await,
            Err(StoreError::Unavailable(_))
        ));
        drop(uow);

        store.heal().await;
        let mut uow = store.begin().await.unwrap();
        assert!(uow.save_room(&loaded).await.is_ok());
    }
}
