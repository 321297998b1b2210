//! Reminder dispatcher
//!
//! Sends every due reminder on all configured channels, then marks it sent
//! whatever the delivery outcome. There is no retry.

use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Reminder, ReminderStatus};
use crate::notify::{deliver, load_billing_context, Message, Notifier};
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub due: usize,
    /// Reminders marked sent after a delivery attempt
    pub sent: usize,
    /// Individual channel failures across all reminders
    pub channel_failures: usize,
    /// Reminders with no resolvable tenant; marked sent without an attempt
    pub skipped: usize,
    pub failed: usize,
}

enum Attempt {
    Delivered { channel_failures: usize },
    NoRecipient,
}

pub struct ReminderDispatcher {
    store: Arc<dyn Store>,
    notifiers: Vec<Arc<dyn Notifier>>,
    send_timeout: Duration,
    app_base_url: String,
}

impl ReminderDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        notifiers: Vec<Arc<dyn Notifier>>,
        send_timeout: Duration,
        app_base_url: String,
    ) -> Self {
        Self {
            store,
            notifiers,
            send_timeout,
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn payment_link(&self, payment_id: Uuid) -> String {
        format!("{}/dashboard/payments/{}", self.app_base_url, payment_id)
    }

    /// Send all Pending, unsent reminders dated on or before `now`
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> ApiResult<DispatchReport> {
        let due = {
            let mut uow = self.store.begin().await?;
            uow.due_reminders(now.date_naive()).await?
        };

        let mut report = DispatchReport {
            due: due.len(),
            ..Default::default()
        };

        for reminder in due {
            let attempt = match self.attempt(&reminder).await {
                Ok(attempt) => attempt,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(reminder_id = %reminder.id, error = %e, "Failed to prepare reminder");
                    continue;
                }
            };

            if let Err(e) = self.mark_sent(reminder.id).await {
                report.failed += 1;
                tracing::error!(reminder_id = %reminder.id, error = %e, "Failed to mark reminder sent");
                continue;
            }

            match attempt {
                Attempt::Delivered { channel_failures } => {
                    report.sent += 1;
                    report.channel_failures += channel_failures;
                }
                Attempt::NoRecipient => report.skipped += 1,
            }
        }

        tracing::info!(
            due = report.due,
            sent = report.sent,
            channel_failures = report.channel_failures,
            skipped = report.skipped,
            failed = report.failed,
            "Reminder dispatch completed"
        );
        Ok(report)
    }

    async fn attempt(&self, reminder: &Reminder) -> ApiResult<Attempt> {
        let context = {
            let mut uow = self.store.begin().await?;
            load_billing_context(uow.as_mut(), reminder.payment_id).await?
        };

        let Some(context) = context else {
            tracing::warn!(reminder_id = %reminder.id, payment_id = %reminder.payment_id, "Reminder payment not found");
            return Ok(Attempt::NoRecipient);
        };
        let Some(recipient) = context.recipient() else {
            tracing::warn!(reminder_id = %reminder.id, "No tenant contact for reminder");
            return Ok(Attempt::NoRecipient);
        };

        let message = Message::PaymentReminder {
            tenant_name: recipient.name.clone(),
            room_number: context.room_number(),
            amount: reminder.amount,
            due_date: context.payment.due_date,
            payment_link: self.payment_link(reminder.payment_id),
        };

        let results = deliver(&self.notifiers, &recipient, &message, self.send_timeout).await;
        let channel_failures = results.iter().filter(|(_, r)| r.is_err()).count();

        Ok(Attempt::Delivered { channel_failures })
    }

    async fn mark_sent(&self, reminder_id: Uuid) -> ApiResult<()> {
        let mut uow = self.store.begin().await?;
        let mut reminder = uow
            .find_reminder(reminder_id)
            .await?
            .ok_or_else(|| ApiError::not_found("reminder", reminder_id))?;
        reminder.sent = true;
        uow.save_reminder(&reminder).await?;
        uow.commit().await?;
        Ok(())
    }

    /// External mark-as-paid action
    pub async fn mark_paid(&self, reminder_id: Uuid) -> ApiResult<Reminder> {
        let mut uow = self.store.begin().await?;
        let mut reminder = uow
            .find_reminder(reminder_id)
            .await?
            .ok_or_else(|| ApiError::not_found("reminder", reminder_id))?;

        if reminder.status != ReminderStatus::Paid {
            reminder.status = ReminderStatus::Paid;
            uow.save_reminder(&reminder).await?;
            uow.commit().await?;
            tracing::info!(reminder_id = %reminder_id, "Reminder marked paid");
        }
        Ok(reminder)
    }

    /// All Pending reminders, by reminder date
    pub async fn pending_reminders(&self) -> ApiResult<Vec<Reminder>> {
        let mut uow = self.store.begin().await?;
        Ok(uow.pending_reminders().await?)
    }

    pub async fn tenant_reminders(&self, tenant_id: Uuid) -> ApiResult<Vec<Reminder>> {
        let mut uow = self.store.begin().await?;
        Ok(uow.reminders_for_tenant(tenant_id).await?)
    }
}
