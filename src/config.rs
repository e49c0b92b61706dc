use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_QUEUE_NAME: &str = "print_queue";
const DEFAULT_QUEUE_BACKEND: &str = "redis";
const DEFAULT_QUEUE_BLOCK_TIMEOUT_SECS: u64 = 5;
const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL (print queue)
    pub redis_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Queue backend selection ("redis" or "in-memory")
    #[serde(default = "default_queue_backend")]
    #[validate(custom = "validate_queue_backend")]
    pub queue_backend: String,

    /// Redis list name used for the print queue
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Blocking timeout (seconds) for queue pops
    #[serde(default = "default_queue_block_timeout_secs")]
    pub queue_block_timeout_secs: u64,

    /// Shared credential for the worker-facing job API
    #[validate(length(min = 16, message = "worker_api_key must be at least 16 characters"))]
    pub worker_api_key: String,

    /// Shared secret for verifying payment provider webhook signatures
    #[validate(length(
        min = 16,
        message = "payment_webhook_secret must be at least 16 characters"
    ))]
    pub payment_webhook_secret: String,

    /// Payment provider API base URL
    #[serde(default = "default_payment_api_base")]
    pub payment_api_base: String,

    /// Payment provider key id
    #[serde(default)]
    pub payment_key_id: Option<String>,

    /// Payment provider key secret
    #[serde(default)]
    pub payment_key_secret: Option<String>,

    /// Chat provider account SID
    #[serde(default)]
    pub chat_account_sid: Option<String>,

    /// Chat provider auth token
    #[serde(default)]
    pub chat_auth_token: Option<String>,

    /// Chat provider sender number (e.g., "whatsapp:+14155238886")
    #[serde(default)]
    pub chat_from_number: Option<String>,

    /// Shared token for the chat webhook verification challenge
    #[serde(default)]
    pub chat_verify_token: Option<String>,

    /// Publicly reachable base URL of this backend (payment callbacks, file
    /// downloads by the worker)
    pub public_base_url: String,

    /// Directory where uploaded documents are stored
    #[serde(default = "default_file_storage_path")]
    pub file_storage_path: String,

    /// Per-page rate for black & white printing
    #[serde(default = "default_price_bw")]
    pub price_per_page_bw: Decimal,

    /// Per-page rate for color printing
    #[serde(default = "default_price_color")]
    pub price_per_page_color: Decimal,

    /// Shop identifier stamped on orders and print jobs (single-shop setup)
    #[serde(default)]
    pub default_shop_id: Option<Uuid>,

    /// Session inactivity timeout in minutes
    #[serde(default = "default_session_timeout_minutes")]
    pub session_timeout_minutes: i64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_queue_backend() -> String {
    DEFAULT_QUEUE_BACKEND.to_string()
}
fn default_queue_name() -> String {
    DEFAULT_QUEUE_NAME.to_string()
}
fn default_queue_block_timeout_secs() -> u64 {
    DEFAULT_QUEUE_BLOCK_TIMEOUT_SECS
}
fn default_payment_api_base() -> String {
    "https://api.razorpay.com".to_string()
}
fn default_file_storage_path() -> String {
    "./uploads".to_string()
}
fn default_price_bw() -> Decimal {
    dec!(2.00)
}
fn default_price_color() -> Decimal {
    dec!(10.00)
}
fn default_session_timeout_minutes() -> i64 {
    DEFAULT_SESSION_TIMEOUT_MINUTES
}

fn validate_queue_backend(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "redis" | "in-memory" => Ok(()),
        _ => Err(validator::ValidationError::new(
            "queue_backend must be \"redis\" or \"in-memory\"",
        )),
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn page_rates(&self) -> crate::services::pricing::PageRates {
        crate::services::pricing::PageRates {
            bw: self.price_per_page_bw,
            color: self.price_per_page_color,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://printdesk.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("public_base_url", "http://localhost:8080")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Check the shared secrets before deserialization for clearer errors.
    if config.get_string("worker_api_key").is_err() {
        error!("Worker API key is not configured. Set APP__WORKER_API_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "worker_api_key is required but not configured".into(),
        )));
    }
    if config.get_string("payment_webhook_secret").is_err() {
        error!("Payment webhook secret is not configured. Set APP__PAYMENT_WEBHOOK_SECRET.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "payment_webhook_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("printdesk_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            redis_url: "redis://localhost:6379".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            environment: "test".into(),
            log_level: "info".into(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
            queue_backend: "in-memory".into(),
            queue_name: DEFAULT_QUEUE_NAME.into(),
            queue_block_timeout_secs: 1,
            worker_api_key: "worker-secret-key-for-tests".into(),
            payment_webhook_secret: "webhook-secret-for-tests".into(),
            payment_api_base: default_payment_api_base(),
            payment_key_id: None,
            payment_key_secret: None,
            chat_account_sid: None,
            chat_auth_token: None,
            chat_from_number: None,
            chat_verify_token: Some("verify-me".into()),
            public_base_url: "http://localhost:8080".into(),
            file_storage_path: "./uploads".into(),
            price_per_page_bw: default_price_bw(),
            price_per_page_color: default_price_color(),
            default_shop_id: None,
            session_timeout_minutes: 30,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_secrets_are_rejected() {
        let mut cfg = base_config();
        cfg.worker_api_key = "short".into();
        assert!(cfg.validate().is_err());

        let mut cfg = base_config();
        cfg.payment_webhook_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_queue_backend_is_rejected() {
        let mut cfg = base_config();
        cfg.queue_backend = "kafka".into();
        assert!(cfg.validate().is_err());
    }
}
