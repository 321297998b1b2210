//! Time-driven batch processes
//!
//! Each stage isolates its items: one booking or reminder failing is logged and
//! the run continues.

mod generator;
mod reminders;
mod sweeper;

pub use generator::{
    decide, BillingCycleGenerator, BillingReport, CycleDecision, BILLING_LEAD_DAYS,
    REMINDER_LEAD_DAYS,
};
pub use reminders::{DispatchReport, ReminderDispatcher};
pub use sweeper::{ExpirySweeper, SweepReport, PENDING_BOOKING_TTL_DAYS};
