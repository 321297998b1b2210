//! WhatsApp through the Fonnte API

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{Channel, Delivery, Message, Notifier, NotifyError, Recipient};

const FONNTE_SEND_URL: &str = "https://api.fonnte.com/send";

pub struct FonnteNotifier {
    token: String,
    endpoint: String,
    client: Client,
}

impl FonnteNotifier {
    pub fn new(token: String, timeout: Duration) -> Self {
        Self {
            token,
            endpoint: FONNTE_SEND_URL.to_string(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl Notifier for FonnteNotifier {
    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    async fn send(&self, recipient: &Recipient, message: &Message) -> Result<Delivery, NotifyError> {
        let Some(target) = recipient.address(Channel::WhatsApp) else {
            return Ok(Delivery::NoAddress);
        };

        // Fonnte takes the raw token, not a bearer scheme
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.token)
            .json(&json!({
                "target": target,
                "message": message.text(),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Delivery::Sent)
    }
}
