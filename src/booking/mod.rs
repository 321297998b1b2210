//! Booking lifecycle
//!
//! Creating, cancelling and extending reservations. A tenant holds at most one
//! Pending or Confirmed booking at any time.

mod model;
mod service;

pub use model::{parse_start_date, BookingSummary, DATE_FORMAT};
pub use service::BookingService;
