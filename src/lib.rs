//! Kosan Backend Library
//!
//! Booking and payment lifecycle plus the monthly billing and reminder
//! engine for a room-rental (kos) business.

pub mod auth;
pub mod billing;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod payment;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;
