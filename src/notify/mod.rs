//! Tenant notifications
//!
//! Every channel implements [`Notifier`]. Callers never branch on the channel
//! type: they hand a [`Recipient`] and a [`Message`] to [`deliver`], which fans
//! out to every configured notifier and only logs failures.

mod context;
mod dispatcher;
mod email;
mod log;
mod whatsapp;

pub use context::{load_billing_context, BillingContext};
pub use dispatcher::{NotificationDispatcher, NotificationJob};
pub use email::HttpMailer;
pub use log::LogNotifier;
pub use whatsapp::FonnteNotifier;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::join_all;
use sqlx::types::chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::NotifyConfig;
use crate::models::TenantContact;

/// Notification errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    WhatsApp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::WhatsApp => write!(f, "whatsapp"),
        }
    }
}

/// Outcome of a single send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The recipient has no address for this channel
    NoAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    pub fn address(&self, channel: Channel) -> Option<&str> {
        let address = match channel {
            Channel::Email => self.email.as_deref(),
            Channel::WhatsApp => self.phone.as_deref(),
        };
        address.filter(|a| !a.trim().is_empty())
    }
}

impl From<TenantContact> for Recipient {
    fn from(contact: TenantContact) -> Self {
        Self {
            name: contact.full_name,
            email: contact.email,
            phone: contact.phone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    PaymentReceived {
        tenant_name: String,
        room_number: Option<String>,
        amount: i64,
        paid_at: DateTime<Utc>,
    },
    PaymentReminder {
        tenant_name: String,
        room_number: Option<String>,
        amount: i64,
        due_date: Option<NaiveDate>,
        payment_link: String,
    },
}

/// Rupiah with `.` thousands separators, e.g. `Rp 1.250.000`
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

fn room_label(room_number: &Option<String>) -> String {
    room_number
        .as_ref()
        .map(|n| format!(" kamar {}", n))
        .unwrap_or_default()
}

impl Message {
    pub fn subject(&self) -> &'static str {
        match self {
            Message::PaymentReceived { .. } => "Pembayaran Diterima",
            Message::PaymentReminder { .. } => "Pengingat Tagihan Sewa",
        }
    }

    /// Plain-text body, used for instant messages
    pub fn text(&self) -> String {
        match self {
            Message::PaymentReceived {
                tenant_name,
                room_number,
                amount,
                paid_at,
            } => format!(
                "Halo {}, pembayaran{} sebesar {} telah kami terima pada {}. Terima kasih.",
                tenant_name,
                room_label(room_number),
                format_rupiah(*amount),
                paid_at.format("%d %b %Y %H:%M"),
            ),
            Message::PaymentReminder {
                tenant_name,
                room_number,
                amount,
                due_date,
                payment_link,
            } => {
                let due = due_date
                    .map(|d| format!(", jatuh tempo {}", d.format("%d %b %Y")))
                    .unwrap_or_default();
                format!(
                    "Halo {}, tagihan sewa{} sebesar {} belum dibayar{}. Bayar di sini: {}",
                    tenant_name,
                    room_label(room_number),
                    format_rupiah(*amount),
                    due,
                    payment_link,
                )
            }
        }
    }

    pub fn html(&self) -> String {
        match self {
            Message::PaymentReceived {
                tenant_name,
                amount,
                paid_at,
                ..
            } => format!(
                "<h2>Pembayaran Berhasil</h2>\
                 <p>Halo, <strong>{}</strong>.</p>\
                 <p>Pembayaran sebesar <strong>{}</strong> telah kami terima pada {}.</p>\
                 <p>Simpan email ini sebagai bukti pembayaran.</p>",
                tenant_name,
                format_rupiah(*amount),
                paid_at.format("%d %b %Y %H:%M"),
            ),
            Message::PaymentReminder {
                tenant_name,
                amount,
                due_date,
                payment_link,
                ..
            } => format!(
                "<h2>Pengingat Tagihan</h2>\
                 <p>Halo, <strong>{}</strong>.</p>\
                 <p>Total tagihan: <strong>{}</strong></p>\
                 <p>Jatuh tempo: {}</p>\
                 <p><a href=\"{}\">Bayar Sekarang</a></p>",
                tenant_name,
                format_rupiah(*amount),
                due_date
                    .map(|d| d.format("%d %b %Y").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                payment_link,
            ),
        }
    }
}

/// A delivery channel
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, recipient: &Recipient, message: &Message) -> Result<Delivery, NotifyError>;
}

/// Send `message` on every notifier concurrently, each bounded by `timeout`.
///
/// Failures are logged and returned, never propagated.
pub async fn deliver(
    notifiers: &[Arc<dyn Notifier>],
    recipient: &Recipient,
    message: &Message,
    timeout: Duration,
) -> Vec<(Channel, Result<Delivery, NotifyError>)> {
    let sends = notifiers.iter().map(|notifier| async move {
        let result = match tokio::time::timeout(timeout, notifier.send(recipient, message)).await
        {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(timeout)),
        };
        (notifier.channel(), result)
    });

    let results = join_all(sends).await;
    for (channel, result) in &results {
        match result {
            Ok(Delivery::Sent) => {
                tracing::debug!(channel = %channel, subject = message.subject(), "Notification sent")
            }
            Ok(Delivery::NoAddress) => {
                tracing::debug!(channel = %channel, recipient = %recipient.name, "No address, skipped")
            }
            Err(e) => {
                tracing::warn!(channel = %channel, recipient = %recipient.name, error = %e, "Notification failed")
            }
        }
    }
    results
}

/// Real channels where configured, log-only simulation otherwise
pub fn notifiers_from_config(config: &NotifyConfig) -> Vec<Arc<dyn Notifier>> {
    let email: Arc<dyn Notifier> = match &config.email_api_url {
        Some(url) => Arc::new(HttpMailer::new(
            url.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
            config.send_timeout,
        )),
        None => {
            tracing::warn!("EMAIL_API_URL not set, email notifications are simulated");
            Arc::new(LogNotifier::new(Channel::Email))
        }
    };

    let whatsapp: Arc<dyn Notifier> = match &config.fonnte_token {
        Some(token) => Arc::new(FonnteNotifier::new(token.clone(), config.send_timeout)),
        None => {
            tracing::warn!("FONNTE_TOKEN not set, WhatsApp notifications are simulated");
            Arc::new(LogNotifier::new(Channel::WhatsApp))
        }
    };

    vec![email, whatsapp]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(950), "Rp 950");
        assert_eq!(format_rupiah(1_000), "Rp 1.000");
        assert_eq!(format_rupiah(1_250_000), "Rp 1.250.000");
        assert_eq!(format_rupiah(-300_000), "-Rp 300.000");
    }

    #[test]
    fn test_reminder_text_includes_link_and_amount() {
        let message = Message::PaymentReminder {
            tenant_name: "Budi".to_string(),
            room_number: Some("A1".to_string()),
            amount: 1_000_000,
            due_date: NaiveDate::from_ymd_opt(2026, 5, 1),
            payment_link: "http://localhost:3000/dashboard/payments/p1".to_string(),
        };
        let text = message.text();
        assert!(text.contains("Budi"));
        assert!(text.contains("kamar A1"));
        assert!(text.contains("Rp 1.000.000"));
        assert!(text.contains("01 May 2026"));
        assert!(text.contains("/dashboard/payments/p1"));
        assert!(message.html().contains("Bayar Sekarang"));
    }

    #[test]
    fn test_recipient_blank_address_is_missing() {
        let recipient = Recipient {
            name: "Budi".to_string(),
            email: Some("  ".to_string()),
            phone: Some("08123".to_string()),
        };
        assert_eq!(recipient.address(Channel::Email), None);
        assert_eq!(recipient.address(Channel::WhatsApp), Some("08123"));
    }
}
