// ## src/config.rs

//! Environment configuration and tracing bootstrap.
//!
//! Design notes:
//! - Every knob is read exactly once, here. The cipher and the facade take
//!   the performance mode as an explicit parameter; nothing below this
//!   module consults the environment.
//! - `validate` holds the production gates: the development cipher profile
//!   and the shipped default secrets are refused when `IS_PRODUCTION` is
//!   set.

use std::env;
use std::str::FromStr;

use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sectify_core::PerformanceMode;

use crate::error::ServiceError;

/// Placeholder master secret shipped for development setups.
pub const DEFAULT_MASTER_SECRET: &str = "default_secret_key";

/// Service configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Master password seed for per-track key derivation.
    pub master_secret: String,
    /// Cipher tuning profile used for new encryptions.
    pub performance_mode: PerformanceMode,
    /// Persistence endpoint for the key-value store adapter.
    pub redis_url: String,
    /// Bind address for the delivery layer.
    pub host: String,
    pub port: u16,
    /// Signing key for access tokens, sessions and signed URLs.
    pub secret_key: String,
    /// JWT algorithm name; only HS256 is supported.
    pub algorithm: String,
    /// Session / access token lifetime in minutes.
    pub access_token_expire_minutes: i64,
    pub is_production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_secret: DEFAULT_MASTER_SECRET.to_string(),
            performance_mode: PerformanceMode::Balanced,
            redis_url: "redis://localhost:6379".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            secret_key: "change-me".to_string(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: 30,
            is_production: false,
        }
    }
}

impl Config {
    /// Resolve the configuration from the environment (after loading any
    /// `.env` file) and apply the production gates.
    pub fn from_env() -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let performance_mode = match env::var("CHAOTIC_PERFORMANCE_MODE") {
            Ok(raw) => PerformanceMode::from_str(&raw).unwrap_or_else(|err| {
                warn!(%err, "falling back to the balanced performance mode");
                PerformanceMode::Balanced
            }),
            Err(_) => defaults.performance_mode,
        };

        let config = Config {
            master_secret: env::var("SECTIFY_MASTER_SECRET")
                .unwrap_or(defaults.master_secret),
            performance_mode,
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: match env::var("PORT") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| ServiceError::Validation(format!("invalid PORT: {raw:?}")))?,
                Err(_) => defaults.port,
            },
            secret_key: env::var("SECRET_KEY").unwrap_or(defaults.secret_key),
            algorithm: env::var("ALGORITHM").unwrap_or(defaults.algorithm),
            access_token_expire_minutes: match env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
                Ok(raw) => raw.parse().map_err(|_| {
                    ServiceError::Validation(format!("invalid ACCESS_TOKEN_EXPIRE_MINUTES: {raw:?}"))
                })?,
                Err(_) => defaults.access_token_expire_minutes,
            },
            is_production: env::var("IS_PRODUCTION")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.is_production),
        };

        config.validate()?;
        Ok(config)
    }

    /// Production gates. Fast mode trades the key schedule down to 10
    /// PBKDF2 iterations and a single lattice site; it exists for local
    /// development only.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.algorithm != "HS256" {
            return Err(ServiceError::Validation(format!(
                "unsupported ALGORITHM {:?}: only HS256 is available",
                self.algorithm
            )));
        }
        if self.access_token_expire_minutes <= 0 {
            return Err(ServiceError::Validation(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be positive".to_string(),
            ));
        }

        if self.is_production {
            if self.performance_mode == PerformanceMode::Fast {
                return Err(ServiceError::Validation(
                    "fast performance mode is refused in production".to_string(),
                ));
            }
            if self.master_secret == DEFAULT_MASTER_SECRET {
                return Err(ServiceError::Validation(
                    "SECTIFY_MASTER_SECRET must be overridden in production".to_string(),
                ));
            }
        } else if self.master_secret == DEFAULT_MASTER_SECRET {
            warn!("running with the default master secret; override SECTIFY_MASTER_SECRET before deploying");
        }
        Ok(())
    }
}

/// Install the global tracing subscriber: JSON lines in production, compact
/// human output in development. Returns an error only if a subscriber is
/// already installed.
pub fn init_tracing(is_production: bool) -> Result<(), ServiceError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if is_production { "info" } else { "debug" }));

    let result = if is_production {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    result.map_err(|err| ServiceError::Internal(format!("tracing init failed: {err}")))
}
