use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "mxn";
const DEFAULT_MAX_CART_QUANTITY: u32 = 9999;
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;
const DEFAULT_PAYMENT_API_URL: &str = "https://api.stripe.com";

/// Application configuration.
///
/// The catalog and payment backends are reached through explicit settings
/// here; there is no ambient client handle anywhere in the crate.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment ("development", "production", ...)
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Public site base URL used to build success/cancel redirect targets.
    /// Checkout requests fail with a configuration error when unset.
    #[serde(default)]
    pub site_url: Option<String>,

    /// Catalog backend base URL (course/class read API, course patch API)
    pub catalog_url: String,

    /// Static token for the catalog backend. Required for course patching.
    #[serde(default)]
    pub catalog_token: Option<String>,

    /// Payment provider API base URL
    #[serde(default = "default_payment_api_url")]
    pub payment_api_url: String,

    /// Payment provider secret key
    #[validate(length(min = 1))]
    pub payment_secret_key: String,

    /// Shared secret for verifying inbound payment webhooks.
    /// Webhook deliveries fail with a configuration error when unset.
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Maximum accepted age of a signed webhook timestamp (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub payment_webhook_tolerance_secs: u64,

    /// Currency for all checkout sessions (single-currency system)
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Upper clamp for per-line cart quantities
    #[serde(default = "default_max_cart_quantity")]
    #[validate(range(min = 1))]
    pub max_cart_quantity: u32,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_max_cart_quantity() -> u32 {
    DEFAULT_MAX_CART_QUANTITY
}
fn default_webhook_tolerance_secs() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}
fn default_payment_api_url() -> String {
    DEFAULT_PAYMENT_API_URL.to_string()
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("dev")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Fails fast on settings that would otherwise surface as 500s on the
    /// first checkout or webhook request of a production deployment.
    pub fn validate_runtime(&self) -> Result<(), ValidationErrors> {
        self.validate()?;

        if !self.is_development() {
            let mut errors = ValidationErrors::new();
            if self.site_url.is_none() {
                errors.add("site_url", missing("site_url is required in production"));
            }
            if self.payment_webhook_secret.is_none() {
                errors.add(
                    "payment_webhook_secret",
                    missing("payment_webhook_secret is required in production"),
                );
            }
            if !errors.is_empty() {
                return Err(errors);
            }
        }

        Ok(())
    }
}

fn missing(message: &'static str) -> ValidationError {
    let mut err = ValidationError::new("required");
    err.message = Some(message.into());
    err
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("courseset_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
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

    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("catalog_url", "http://localhost:8055")?
        .set_default("payment_secret_key", "")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate_runtime()?;

    Ok(app_config)
}
