//! Payment lifecycle
//!
//! Opening payments ([`PaymentSessionService`]), applying outcomes atomically
//! across payment, booking and room ([`SettlementCoordinator`]), and mapping
//! gateway statuses onto those outcomes ([`GatewayReconciler`]).

mod model;
mod reconciler;
mod session;
mod settlement;

pub use model::{
    new_order_id, quote, Outcome, PaymentSession, Quote, Settlement, Transition,
    CASH_PAYMENT_TOKEN, DP_PERCENT,
};
pub use reconciler::{GatewayReconciler, Reconciliation};
pub use session::PaymentSessionService;
pub use settlement::SettlementCoordinator;
