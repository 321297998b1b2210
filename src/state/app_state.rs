//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::TokenKeys;
use crate::billing::ReminderDispatcher;
use crate::booking::BookingService;
use crate::gateway::PaymentGateway;
use crate::notify::NotificationDispatcher;
use crate::payment::{GatewayReconciler, PaymentSessionService, SettlementCoordinator};
use crate::store::Store;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentSessionService>,
    pub settlement: Arc<SettlementCoordinator>,
    pub reconciler: Arc<GatewayReconciler>,
    pub reminders: Arc<ReminderDispatcher>,
    pub token_keys: Arc<TokenKeys>,
}

impl AppState {
    /// Wire the engine services over one store and gateway
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        notifications: Arc<NotificationDispatcher>,
        reminders: Arc<ReminderDispatcher>,
        token_keys: TokenKeys,
    ) -> Self {
        let payments = Arc::new(PaymentSessionService::new(store.clone(), gateway.clone()));
        let settlement = Arc::new(SettlementCoordinator::new(store.clone(), notifications));
        let reconciler = Arc::new(GatewayReconciler::new(
            store.clone(),
            gateway,
            settlement.clone(),
        ));
        let bookings = Arc::new(BookingService::new(store.clone(), payments.clone()));

        Self {
            store,
            bookings,
            payments,
            settlement,
            reconciler,
            reminders,
            token_keys: Arc::new(token_keys),
        }
    }
}

impl FromRef<AppState> for Arc<TokenKeys> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_keys.clone()
    }
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.bookings.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentSessionService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for Arc<SettlementCoordinator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.settlement.clone()
    }
}

impl FromRef<AppState> for Arc<GatewayReconciler> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reconciler.clone()
    }
}

impl FromRef<AppState> for Arc<ReminderDispatcher> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reminders.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}
