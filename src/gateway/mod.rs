//! Payment gateway client boundary
//!
//! The engine only needs three things from a gateway: a hosted payment
//! session, a status lookup, and verification of inbound notifications.

mod midtrans;

pub use midtrans::{notification_signature, MidtransGateway};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Notification signature mismatch")]
    InvalidSignature,

    #[error("Malformed gateway payload: {0}")]
    MalformedPayload(String),

    #[error("Gateway is not configured")]
    NotConfigured,
}

/// Buyer details forwarded to the hosted payment page
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// What is being paid for
#[derive(Debug, Clone)]
pub struct OrderContext {
    pub order_id: String,
    pub booking_id: Uuid,
    pub room_id: Uuid,
    pub item_name: String,
    pub customer: Option<Customer>,
}

/// Hosted session returned by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySession {
    pub token: String,
    pub redirect_url: String,
}

/// Transaction status as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Settlement,
    Capture,
    Expire,
    Cancel,
    Deny,
    Other(String),
}

impl GatewayStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "settlement" => GatewayStatus::Settlement,
            "capture" => GatewayStatus::Capture,
            "expire" => GatewayStatus::Expire,
            "cancel" => GatewayStatus::Cancel,
            "deny" => GatewayStatus::Deny,
            other => GatewayStatus::Other(other.to_string()),
        }
    }

    /// Money has been received
    pub fn is_settled(&self) -> bool {
        matches!(self, GatewayStatus::Settlement | GatewayStatus::Capture)
    }

    /// The transaction will never settle
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            GatewayStatus::Expire | GatewayStatus::Cancel | GatewayStatus::Deny
        )
    }
}

/// A verified inbound notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub order_id: String,
    pub status: GatewayStatus,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(
        &self,
        order: &OrderContext,
        amount: i64,
    ) -> Result<GatewaySession, GatewayError>;

    async fn check_status(&self, order_id: &str) -> Result<GatewayStatus, GatewayError>;

    /// Authenticate a notification payload and extract its order id and status
    fn verify_notification(
        &self,
        payload: &serde_json::Value,
    ) -> Result<GatewayNotification, GatewayError>;
}
