//! Gateway reconciler - maps gateway statuses onto settlement calls

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::model::{Outcome, Settlement};
use super::settlement::SettlementCoordinator;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{GatewayStatus, PaymentGateway};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Reconciliation {
    Settled(Settlement),
    Failed(Settlement),
    /// Status with no mapping (e.g. `pending`); nothing was written
    Ignored { payment_id: Uuid, status: String },
}

pub struct GatewayReconciler {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    settlement: Arc<SettlementCoordinator>,
}

impl GatewayReconciler {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        settlement: Arc<SettlementCoordinator>,
    ) -> Self {
        Self {
            store,
            gateway,
            settlement,
        }
    }

    /// Apply an inbound gateway notification
    pub async fn handle_notification(
        &self,
        payload: &serde_json::Value,
    ) -> ApiResult<Reconciliation> {
        let notification = self.gateway.verify_notification(payload)?;
        let payment_id = self.payment_id_for(&notification.order_id).await?;

        tracing::info!(
            order_id = %notification.order_id,
            status = ?notification.status,
            "Gateway notification received"
        );
        self.apply(payment_id, notification.status).await
    }

    /// Poll the gateway for an order and apply whatever it reports
    pub async fn verify_payment(&self, order_id: &str) -> ApiResult<Reconciliation> {
        let payment_id = self.payment_id_for(order_id).await?;
        let status = self.gateway.check_status(order_id).await?;

        tracing::info!(order_id = %order_id, status = ?status, "Gateway status polled");
        self.apply(payment_id, status).await
    }

    async fn payment_id_for(&self, order_id: &str) -> ApiResult<Uuid> {
        // Read-only; released before settlement opens its own unit of work
        let mut uow = self.store.begin().await?;
        let payment = uow
            .find_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| ApiError::not_found("payment", order_id))?;
        Ok(payment.id)
    }

    async fn apply(&self, payment_id: Uuid, status: GatewayStatus) -> ApiResult<Reconciliation> {
        if status.is_settled() {
            let settlement = self.settlement.settle(payment_id, Outcome::Settled).await?;
            return Ok(Reconciliation::Settled(settlement));
        }
        if status.is_failed() {
            let settlement = self.settlement.fail(payment_id).await?;
            return Ok(Reconciliation::Failed(settlement));
        }

        let status = match status {
            GatewayStatus::Other(raw) => raw,
            known => format!("{:?}", known).to_lowercase(),
        };
        tracing::debug!(payment_id = %payment_id, status = %status, "Gateway status ignored");
        Ok(Reconciliation::Ignored { payment_id, status })
    }
}
