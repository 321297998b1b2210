//! API handlers
//!
//! Each handler parses input, resolves the caller and calls one engine
//! operation.

mod booking;
mod health;
mod payment;
mod reminder;

pub use booking::*;
pub use health::*;
pub use payment::*;
pub use reminder::*;
