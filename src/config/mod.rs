//! Configuration management for the kosan backend
//!
//! Loads and validates configuration from environment variables, with support
//! for different environments (development, staging, production).

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

/// Midtrans credentials
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server_key: String,
    pub is_production: bool,
    pub timeout: Duration,
}

/// Notification channel settings; a missing channel runs in log-only mode
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: String,
    pub fonnte_token: Option<String>,
    pub workers: usize,
    pub queue_capacity: usize,
    pub send_timeout: Duration,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Secret used to verify bearer tokens
    pub jwt_secret: String,

    pub gateway: GatewayConfig,

    pub notify: NotifyConfig,

    /// Frontend base URL used in payment links
    pub app_base_url: String,

    /// Six-field cron expression (UTC) for the daily billing run
    pub billing_cron: String,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// A secret that must be set in production; other environments fall back to `dev_default`
fn production_secret(
    key: &str,
    value: Option<String>,
    environment: Environment,
    dev_default: &str,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ if environment.is_production() => Err(ConfigError::MissingEnvVar(key.to_string())),
        _ => Ok(dev_default.to_string()),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| s.parse::<Environment>())
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 5u32);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = production_secret(
            "JWT_SECRET",
            env::var("JWT_SECRET").ok(),
            environment,
            "development-secret-change-in-production",
        )?;

        let server_key = production_secret(
            "MIDTRANS_SERVER_KEY",
            env::var("MIDTRANS_SERVER_KEY").ok(),
            environment,
            "",
        )?;

        let gateway = GatewayConfig {
            server_key,
            is_production: parse_or("MIDTRANS_IS_PRODUCTION", false),
            timeout: Duration::from_secs(parse_or("GATEWAY_TIMEOUT_SECS", 10u64)),
        };

        let workers = parse_or("NOTIFY_WORKERS", 4usize);
        let queue_capacity = parse_or("NOTIFY_QUEUE_CAPACITY", 256usize);
        if workers == 0 || queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "NOTIFY_WORKERS and NOTIFY_QUEUE_CAPACITY must be positive".to_string(),
            ));
        }

        let notify = NotifyConfig {
            email_api_url: env::var("EMAIL_API_URL").ok().filter(|v| !v.is_empty()),
            email_api_key: env::var("EMAIL_API_KEY").ok().filter(|v| !v.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Kosan <noreply@kosan.local>".to_string()),
            fonnte_token: env::var("FONNTE_TOKEN").ok().filter(|v| !v.is_empty()),
            workers,
            queue_capacity,
            send_timeout: Duration::from_secs(parse_or("NOTIFY_TIMEOUT_SECS", 10u64)),
        };

        let app_base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let billing_cron = env::var("BILLING_CRON").unwrap_or_else(|_| "0 0 1 * * *".to_string());

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            gateway,
            notify,
            app_base_url,
            billing_cron,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}
