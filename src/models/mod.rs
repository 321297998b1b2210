//! Data models for the lease engine
//!
//! Rooms, bookings, payments and reminders are the four entities whose status
//! the engine keeps consistent. Tenants are owned by the profile service; only
//! the contact details needed for notifications are modelled here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Room model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: Uuid,
    pub number: String,
    pub price_per_month: i64, // Whole Rupiah
    pub status: RoomStatus,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "room_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Full,
}

/// Booking model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub room_id: Uuid,
    pub start_date: NaiveDate,
    pub duration_months: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Pending and Confirmed bookings count against the one-per-tenant limit
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed, // Set by the lease-end process, never by this engine
}

impl BookingStatus {
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

/// Payment model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: i64,
    pub dp_amount: i64,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    #[sqlx(rename = "payment_type")]
    #[serde(rename = "type")]
    pub kind: PaymentType,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub external_order_id: Option<String>,
    pub gateway_token: Option<String>,
    pub proof_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed, // Cash or manual confirmation by an admin
    Settled,   // Gateway settlement
    Rejected,
    Failed,
}

impl PaymentStatus {
    /// An open bill still awaits money from the tenant
    pub fn is_open(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Rejected)
    }

    pub fn is_paid(self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Settled)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Gateway,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Full,
    Dp,
    Extend,
}

/// Reminder model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: i64,
    pub reminder_date: NaiveDate,
    pub status: ReminderStatus,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "reminder_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Paid,
}

/// Contact details of a tenant, read from the profile service's table
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct TenantContact {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Caller role carried in the bearer token
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tenant,
    Admin,
}

/// Authenticated caller, resolved once at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub tenant_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            role: Role::Tenant,
        }
    }

    pub fn admin(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, booking: &Booking) -> bool {
        booking.tenant_id == self.tenant_id
    }
}

/// Generic API response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_classes() {
        assert!(PaymentStatus::Pending.is_open());
        assert!(PaymentStatus::Rejected.is_open());
        assert!(!PaymentStatus::Failed.is_open());
        assert!(PaymentStatus::Confirmed.is_paid());
        assert!(PaymentStatus::Settled.is_paid());
        assert!(!PaymentStatus::Pending.is_paid());
    }

    #[test]
    fn test_booking_status_active() {
        assert!(BookingStatus::Pending.is_active());
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
        assert!(!BookingStatus::Completed.is_active());
    }

    #[test]
    fn test_payment_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PaymentType::Dp).unwrap(), "\"dp\"");
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"gateway\"").unwrap(),
            PaymentMethod::Gateway
        );
    }
}
