//! Simulation channel for unconfigured providers

use async_trait::async_trait;

use super::{Channel, Delivery, Message, Notifier, NotifyError, Recipient};

pub struct LogNotifier {
    channel: Channel,
}

impl LogNotifier {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &Recipient, message: &Message) -> Result<Delivery, NotifyError> {
        let Some(address) = recipient.address(self.channel) else {
            return Ok(Delivery::NoAddress);
        };

        tracing::info!(
            channel = %self.channel,
            to = %address,
            subject = message.subject(),
            body = %message.text(),
            "Simulated notification"
        );
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::chrono::Utc;

    #[tokio::test]
    async fn test_log_notifier_reports_missing_address() {
        let notifier = LogNotifier::new(Channel::WhatsApp);
        let recipient = Recipient {
            name: "Sari".to_string(),
            email: Some("sari@example.com".to_string()),
            phone: None,
        };
        let message = Message::PaymentReceived {
            tenant_name: "Sari".to_string(),
            room_number: None,
            amount: 500_000,
            paid_at: Utc::now(),
        };

        let delivery = notifier.send(&recipient, &message).await.unwrap();
        assert_eq!(delivery, Delivery::NoAddress);

        let delivery = LogNotifier::new(Channel::Email)
            .send(&recipient, &message)
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Sent);
    }
}
