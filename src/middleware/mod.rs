//! HTTP middleware: caller authentication and request tracing

pub mod auth;
mod tracing;

pub use auth::AdminPrincipal;
pub use self::tracing::request_tracing;
