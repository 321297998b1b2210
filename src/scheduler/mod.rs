//! Daily batch trigger
//!
//! One cron job runs the expiry sweep, the billing cycle and the reminder
//! dispatch, in that order. A stage that errors is logged and the next stage
//! still runs.

use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::billing::{
    BillingCycleGenerator, BillingReport, DispatchReport, ExpirySweeper, ReminderDispatcher,
    SweepReport,
};
use crate::store::Store;

/// Scheduler errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{0}': {1}")]
    InvalidSchedule(String, String),

    #[error("Job scheduler error: {0}")]
    Scheduler(String),
}

/// Per-stage outcome of one daily run; `None` means the stage failed
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyRunReport {
    pub sweep: Option<SweepReport>,
    pub billing: Option<BillingReport>,
    pub reminders: Option<DispatchReport>,
}

struct DailyStages {
    sweeper: ExpirySweeper,
    generator: BillingCycleGenerator,
    reminders: Arc<ReminderDispatcher>,
}

impl DailyStages {
    async fn run(&self, now: DateTime<Utc>) -> DailyRunReport {
        tracing::info!(now = %now, "Daily billing run started");

        let sweep = match self.sweeper.sweep(now).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Expiry sweep failed");
                None
            }
        };

        let billing = match self.generator.run(now).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Billing cycle failed");
                None
            }
        };

        let reminders = match self.reminders.dispatch_due(now).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Reminder dispatch failed");
                None
            }
        };

        DailyRunReport {
            sweep,
            billing,
            reminders,
        }
    }
}

pub struct LeaseScheduler {
    stages: Arc<DailyStages>,
    cron: String,
    scheduler: Mutex<Option<JobScheduler>>,
}

impl LeaseScheduler {
    pub fn new(store: Arc<dyn Store>, reminders: Arc<ReminderDispatcher>, cron: String) -> Self {
        Self {
            stages: Arc::new(DailyStages {
                sweeper: ExpirySweeper::new(store.clone()),
                generator: BillingCycleGenerator::new(store),
                reminders,
            }),
            cron,
            scheduler: Mutex::new(None),
        }
    }

    /// Run every stage once, as the cron job does
    pub async fn run_daily(&self, now: DateTime<Utc>) -> DailyRunReport {
        self.stages.run(now).await
    }

    /// Register the cron job and start ticking. Calling twice is a no-op.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Scheduler(format!("{:?}", e)))?;

        let stages = self.stages.clone();
        let job = Job::new_async(self.cron.as_str(), move |_id, _lock| {
            let stages = stages.clone();
            Box::pin(async move {
                stages.run(Utc::now()).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule(self.cron.clone(), format!("{:?}", e)))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::Scheduler(format!("{:?}", e)))?;
        scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::Scheduler(format!("{:?}", e)))?;

        tracing::info!(cron = %self.cron, "Billing scheduler started");
        *slot = Some(scheduler);
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };
        scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::Scheduler(format!("{:?}", e)))?;
        tracing::info!("Billing scheduler stopped");
        Ok(())
    }
}
