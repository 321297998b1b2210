//! Bounded post-commit notification queue
//!
//! Settlement enqueues jobs after its transaction commits. A fixed pool of
//! workers drains the queue. A full queue drops the job instead of blocking the
//! caller.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{deliver, load_billing_context, Message, Notifier};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationJob {
    PaymentReceived { payment_id: Uuid },
}

struct Worker {
    store: Arc<dyn Store>,
    notifiers: Vec<Arc<dyn Notifier>>,
    send_timeout: Duration,
}

impl Worker {
    async fn run(
        self,
        id: usize,
        receiver: Arc<Mutex<mpsc::Receiver<NotificationJob>>>,
        mut cancel: watch::Receiver<bool>,
    ) {
        tracing::debug!(worker = id, "Notification worker started");
        loop {
            if *cancel.borrow() {
                break;
            }

            let job = {
                let mut rx = receiver.lock().await;
                tokio::select! {
                    biased;
                    _ = cancel.changed() => None,
                    job = rx.recv() => job,
                }
            };

            let Some(job) = job else {
                break;
            };
            self.process(job).await;
        }
        tracing::debug!(worker = id, "Notification worker stopped");
    }

    async fn process(&self, job: NotificationJob) {
        match job {
            NotificationJob::PaymentReceived { payment_id } => {
                let context = match self.store.begin().await {
                    Ok(mut uow) => load_billing_context(uow.as_mut(), payment_id).await,
                    Err(e) => Err(e),
                };

                let context = match context {
                    Ok(Some(context)) => context,
                    Ok(None) => {
                        tracing::warn!(payment_id = %payment_id, "Payment vanished before notification");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(payment_id = %payment_id, error = %e, "Failed to load notification context");
                        return;
                    }
                };

                let Some(recipient) = context.recipient() else {
                    tracing::warn!(payment_id = %payment_id, "No tenant contact, skipping notification");
                    return;
                };

                let message = Message::PaymentReceived {
                    tenant_name: recipient.name.clone(),
                    room_number: context.room_number(),
                    amount: context.payment.amount,
                    paid_at: context
                        .payment
                        .paid_at
                        .unwrap_or_else(sqlx::types::chrono::Utc::now),
                };

                deliver(&self.notifiers, &recipient, &message, self.send_timeout).await;
            }
        }
    }
}

/// Fixed worker pool over a bounded job queue
pub struct NotificationDispatcher {
    sender: Mutex<Option<mpsc::Sender<NotificationJob>>>,
    cancel: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationDispatcher {
    /// Spawn `workers` tasks; must be called inside a tokio runtime
    pub fn start(
        store: Arc<dyn Store>,
        notifiers: Vec<Arc<dyn Notifier>>,
        workers: usize,
        capacity: usize,
        send_timeout: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let (cancel, cancel_rx) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|id| {
                let worker = Worker {
                    store: store.clone(),
                    notifiers: notifiers.clone(),
                    send_timeout,
                };
                tokio::spawn(worker.run(id, receiver.clone(), cancel_rx.clone()))
            })
            .collect();

        tracing::info!(workers, capacity, "Notification dispatcher started");

        Self {
            sender: Mutex::new(Some(sender)),
            cancel,
            workers: Mutex::new(handles),
        }
    }

    /// Queue a job without waiting. Returns false when the job was dropped.
    pub async fn enqueue(&self, job: NotificationJob) -> bool {
        let guard = self.sender.lock().await;
        let Some(sender) = guard.as_ref() else {
            tracing::warn!(?job, "Notification dispatcher closed, job dropped");
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(?job, "Notification queue full, job dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(?job, "Notification workers gone, job dropped");
                false
            }
        }
    }

    /// Stop accepting jobs, finish everything already queued, then stop
    pub async fn close(&self) {
        self.sender.lock().await.take();
        self.join().await;
    }

    /// Stop accepting jobs and abandon the queue; in-flight sends finish
    pub async fn cancel(&self) {
        self.sender.lock().await.take();
        let _ = self.cancel.send(true);
        self.join().await;
    }

    async fn join(&self) {
        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Notification worker panicked");
            }
        }
        tracing::info!("Notification dispatcher stopped");
    }
}
