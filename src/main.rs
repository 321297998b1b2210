//! Kosan Backend Server
//!
//! HTTP API for bookings and payments, the Midtrans webhook, and the daily
//! billing scheduler.

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use kosan_server::auth::TokenKeys;
use kosan_server::billing::ReminderDispatcher;
use kosan_server::config::Config;
use kosan_server::db;
use kosan_server::gateway::MidtransGateway;
use kosan_server::notify::{notifiers_from_config, NotificationDispatcher};
use kosan_server::routes;
use kosan_server::scheduler::LeaseScheduler;
use kosan_server::state::AppState;
use kosan_server::store::{PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        database = %config.database_url_masked(),
        "Starting kosan server"
    );

    let db_pool = db::connect(&config).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool));
    let gateway = Arc::new(MidtransGateway::new(&config.gateway));
    if config.gateway.server_key.is_empty() {
        tracing::warn!("MIDTRANS_SERVER_KEY not set, gateway payments are disabled");
    }

    let notifiers = notifiers_from_config(&config.notify);
    let notifications = Arc::new(NotificationDispatcher::start(
        store.clone(),
        notifiers.clone(),
        config.notify.workers,
        config.notify.queue_capacity,
        config.notify.send_timeout,
    ));
    let reminders = Arc::new(ReminderDispatcher::new(
        store.clone(),
        notifiers,
        config.notify.send_timeout,
        config.app_base_url.clone(),
    ));

    let scheduler = LeaseScheduler::new(store.clone(), reminders.clone(), config.billing_cron.clone());
    scheduler.start().await?;

    let app_state = AppState::new(
        store,
        gateway,
        notifications.clone(),
        reminders,
        TokenKeys::new(config.jwt_secret.clone()),
    );

    let app = routes::app(app_state).layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.stop().await {
        tracing::warn!(error = %e, "Scheduler did not stop cleanly");
    }
    notifications.close().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
