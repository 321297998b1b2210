//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use kosan_server::auth::TokenKeys;
use kosan_server::billing::ReminderDispatcher;
use kosan_server::gateway::{
    notification_signature, GatewayError, GatewayNotification, GatewaySession, GatewayStatus,
    OrderContext, PaymentGateway,
};
use kosan_server::models::{Booking, BookingStatus, Room, RoomStatus, TenantContact};
use kosan_server::notify::{
    Channel, Delivery, Message, NotificationDispatcher, Notifier, NotifyError, Recipient,
};
use kosan_server::state::AppState;
use kosan_server::store::{MemoryStore, NewBooking, Store};

pub const SERVER_KEY: &str = "SB-Mid-server-test";
pub const JWT_SECRET: &str = "test-secret-key";
pub const APP_BASE_URL: &str = "https://kos.example.com";

/// Scripted gateway: records sessions, answers status lookups from a table
#[derive(Default)]
pub struct FakeGateway {
    pub fail_sessions: Mutex<bool>,
    pub sessions: Mutex<Vec<(String, i64)>>,
    pub statuses: Mutex<HashMap<String, GatewayStatus>>,
}

impl FakeGateway {
    pub fn set_failing(&self, failing: bool) {
        *self.fail_sessions.lock().unwrap() = failing;
    }

    pub fn set_status(&self, order_id: &str, status: GatewayStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(order_id.to_string(), status);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_session(
        &self,
        order: &OrderContext,
        amount: i64,
    ) -> Result<GatewaySession, GatewayError> {
        if *self.fail_sessions.lock().unwrap() {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.sessions
            .lock()
            .unwrap()
            .push((order.order_id.clone(), amount));
        Ok(GatewaySession {
            token: format!("snap-{}", order.order_id),
            redirect_url: format!("https://pay.example.com/{}", order.order_id),
        })
    }

    async fn check_status(&self, order_id: &str) -> Result<GatewayStatus, GatewayError> {
        self.statuses
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                body: "Transaction doesn't exist.".to_string(),
            })
    }

    fn verify_notification(&self, payload: &Value) -> Result<GatewayNotification, GatewayError> {
        let field = |name: &str| {
            payload
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| GatewayError::MalformedPayload(format!("missing {}", name)))
        };
        let order_id = field("order_id")?;
        let expected = notification_signature(
            order_id,
            field("status_code")?,
            field("gross_amount")?,
            SERVER_KEY,
        );
        if field("signature_key")? != expected {
            return Err(GatewayError::InvalidSignature);
        }
        Ok(GatewayNotification {
            order_id: order_id.to_string(),
            status: GatewayStatus::parse(field("transaction_status")?),
        })
    }
}

/// Signed notification body as the gateway would post it
pub fn signed_notification(order_id: &str, transaction_status: &str, gross_amount: i64) -> Value {
    let gross_amount = format!("{}.00", gross_amount);
    json!({
        "order_id": order_id,
        "status_code": "200",
        "gross_amount": gross_amount,
        "transaction_status": transaction_status,
        "signature_key": notification_signature(order_id, "200", &gross_amount, SERVER_KEY),
    })
}

/// Notifier that keeps every message it was asked to send
pub struct RecordingNotifier {
    channel: Channel,
    pub sent: Mutex<Vec<(Recipient, Message)>>,
}

impl RecordingNotifier {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &Recipient, message: &Message) -> Result<Delivery, NotifyError> {
        if recipient.address(self.channel).is_none() {
            return Ok(Delivery::NoAddress);
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.clone(), message.clone()));
        Ok(Delivery::Sent)
    }
}

/// Notifier whose provider is always down
pub struct FailingNotifier {
    channel: Channel,
}

impl FailingNotifier {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _recipient: &Recipient, _message: &Message) -> Result<Delivery, NotifyError> {
        Err(NotifyError::Rejected {
            status: 500,
            body: "provider down".to_string(),
        })
    }
}

/// Engine wired over a memory store with fake collaborators
pub struct TestApp {
    pub store: MemoryStore,
    pub gateway: Arc<FakeGateway>,
    pub email: Arc<RecordingNotifier>,
    pub notifications: Arc<NotificationDispatcher>,
    pub reminders: Arc<ReminderDispatcher>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let email = Arc::new(RecordingNotifier::new(Channel::Email));
        let notifiers: Vec<Arc<dyn Notifier>> = vec![
            email.clone(),
            Arc::new(FailingNotifier::new(Channel::WhatsApp)),
        ];
        Self::with_notifiers(email, notifiers)
    }

    pub fn with_notifiers(email: Arc<RecordingNotifier>, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        let store = MemoryStore::new();
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let gateway = Arc::new(FakeGateway::default());

        let notifications = Arc::new(NotificationDispatcher::start(
            shared.clone(),
            notifiers.clone(),
            2,
            16,
            std::time::Duration::from_secs(1),
        ));
        let reminders = Arc::new(ReminderDispatcher::new(
            shared.clone(),
            notifiers,
            std::time::Duration::from_secs(1),
            APP_BASE_URL.to_string(),
        ));
        let state = AppState::new(
            shared,
            gateway.clone(),
            notifications.clone(),
            reminders.clone(),
            TokenKeys::new(JWT_SECRET),
        );

        Self {
            store,
            gateway,
            email,
            notifications,
            reminders,
            state,
        }
    }

    pub fn shared_store(&self) -> Arc<dyn Store> {
        Arc::new(self.store.clone())
    }

    /// Available room at `price` per month
    pub async fn room(&self, number: &str, price: i64) -> Room {
        let room = Room {
            id: Uuid::new_v4(),
            number: number.to_string(),
            price_per_month: price,
            status: RoomStatus::Available,
        };
        self.store.put_room(room.clone()).await;
        room
    }

    /// Tenant with an email address and a phone number
    pub async fn tenant(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .put_tenant(TenantContact {
                id,
                full_name: name.to_string(),
                email: Some(format!("{}@example.com", name.to_lowercase())),
                phone: Some("081234567890".to_string()),
            })
            .await;
        id
    }

    /// Insert a booking directly, bypassing the service
    pub async fn insert_booking(
        &self,
        tenant_id: Uuid,
        room_id: Uuid,
        start_date: NaiveDate,
        status: BookingStatus,
        created_at: DateTime<Utc>,
    ) -> Booking {
        let mut uow = self.store.begin().await.unwrap();
        let booking = uow
            .insert_booking(NewBooking {
                tenant_id,
                room_id,
                start_date,
                duration_months: 1,
                status,
                created_at,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        booking
    }

    /// Drain queued notifications
    pub async fn flush_notifications(&self) {
        self.notifications.close().await;
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Midnight UTC on the given day
pub fn at(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}
