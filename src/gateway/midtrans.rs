//! Midtrans Snap client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha512};

use super::{
    GatewayError, GatewayNotification, GatewaySession, GatewayStatus, OrderContext, PaymentGateway,
};
use crate::config::GatewayConfig;

const SNAP_SANDBOX_URL: &str = "https://app.sandbox.midtrans.com";
const SNAP_PRODUCTION_URL: &str = "https://app.midtrans.com";
const API_SANDBOX_URL: &str = "https://api.sandbox.midtrans.com";
const API_PRODUCTION_URL: &str = "https://api.midtrans.com";

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    transaction_status: Option<String>,
    status_code: Option<String>,
    status_message: Option<String>,
}

pub struct MidtransGateway {
    server_key: String,
    snap_url: String,
    api_url: String,
    client: Client,
}

impl MidtransGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        let (snap_url, api_url) = if config.is_production {
            (SNAP_PRODUCTION_URL, API_PRODUCTION_URL)
        } else {
            (SNAP_SANDBOX_URL, API_SANDBOX_URL)
        };

        Self {
            server_key: config.server_key.clone(),
            snap_url: snap_url.to_string(),
            api_url: api_url.to_string(),
            client: Client::builder()
                .timeout(config.timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.server_key.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }
}

/// SHA-512 over order id, status code, gross amount and server key, hex encoded
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn required_str<'a>(payload: &'a serde_json::Value, field: &str) -> Result<&'a str, GatewayError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::MalformedPayload(format!("missing field '{}'", field)))
}

#[async_trait]
impl PaymentGateway for MidtransGateway {
    async fn create_session(
        &self,
        order: &OrderContext,
        amount: i64,
    ) -> Result<GatewaySession, GatewayError> {
        self.ensure_configured()?;

        let mut body = json!({
            "transaction_details": {
                "order_id": order.order_id,
                "gross_amount": amount,
            },
            "item_details": [{
                "id": order.room_id,
                "price": amount,
                "quantity": 1,
                "name": order.item_name,
            }],
        });
        if let Some(customer) = &order.customer {
            body["customer_details"] = json!({
                "first_name": customer.name,
                "email": customer.email,
                "phone": customer.phone,
            });
        }

        let response = self
            .client
            .post(format!("{}/snap/v1/transactions", self.snap_url))
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let snap: SnapResponse = response.json().await?;
        tracing::debug!(order_id = %order.order_id, "Snap transaction created");

        Ok(GatewaySession {
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }

    async fn check_status(&self, order_id: &str) -> Result<GatewayStatus, GatewayError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(format!("{}/v2/{}/status", self.api_url, order_id))
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // The status API answers 200 with an error status_code for unknown orders
        let parsed: StatusResponse = response.json().await?;
        match parsed.transaction_status {
            Some(raw) => Ok(GatewayStatus::parse(&raw)),
            None => Err(GatewayError::Rejected {
                status: parsed
                    .status_code
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(status.as_u16()),
                body: parsed.status_message.unwrap_or_default(),
            }),
        }
    }

    fn verify_notification(
        &self,
        payload: &serde_json::Value,
    ) -> Result<GatewayNotification, GatewayError> {
        self.ensure_configured()?;

        let order_id = required_str(payload, "order_id")?;
        let status_code = required_str(payload, "status_code")?;
        let gross_amount = required_str(payload, "gross_amount")?;
        let signature = required_str(payload, "signature_key")?;
        let transaction_status = required_str(payload, "transaction_status")?;

        let expected =
            notification_signature(order_id, status_code, gross_amount, &self.server_key);
        if !expected.eq_ignore_ascii_case(signature) {
            tracing::warn!(order_id = %order_id, "Rejected notification with bad signature");
            return Err(GatewayError::InvalidSignature);
        }

        Ok(GatewayNotification {
            order_id: order_id.to_string(),
            status: GatewayStatus::parse(transaction_status),
        })
    }
}
