//! Email over a JSON mail relay

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{Channel, Delivery, Message, Notifier, NotifyError, Recipient};

pub struct HttpMailer {
    api_url: String,
    api_key: Option<String>,
    from: String,
    client: Client,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: Option<String>, from: String, timeout: Duration) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, recipient: &Recipient, message: &Message) -> Result<Delivery, NotifyError> {
        let Some(to) = recipient.address(Channel::Email) else {
            return Ok(Delivery::NoAddress);
        };

        let mut request = self.client.post(&self.api_url).json(&json!({
            "from": self.from,
            "to": to,
            "subject": message.subject(),
            "html": message.html(),
            "text": message.text(),
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
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
