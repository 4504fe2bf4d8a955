use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    // None means the seat pool lives in process memory
    pub database: Option<DatabaseConfig>,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
    pub log_format: LogFormat,
    pub request_timeout_ms: u64,
    pub auto_initialize: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
}

/// Seat pool sizing and allocation limits.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BookingConfig {
    /// Total seats in the pool, numbered `1..=capacity`.
    pub capacity: i32,
    /// Largest seat count a single booking may request.
    pub max_batch: i32,
    /// Retries after a contended commit, on top of the first attempt.
    pub max_retries: u32,
    /// Base delay before a retry; doubles per attempt, with jitter.
    pub retry_backoff_ms: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            capacity: 80,
            max_batch: 7,
            max_retries: 3,
            retry_backoff_ms: 5,
        }
    }
}

impl BookingConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < 1 {
            return Err(ConfigError::Invalid {
                key: "CAPACITY",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_batch < 1 {
            return Err(ConfigError::Invalid {
                key: "MAX_BATCH",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    Parse { key: &'static str, value: String },
    #[error("{key} {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(ConfigError::Parse {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                pool_size: parse_var("DB_POOL_SIZE", 20)?,
                acquire_timeout_secs: parse_var("DB_ACQUIRE_TIMEOUT_SECS", 5)?,
            }),
            _ => None,
        };

        let defaults = BookingConfig::default();
        let booking = BookingConfig {
            capacity: parse_var("CAPACITY", defaults.capacity)?,
            max_batch: parse_var("MAX_BATCH", defaults.max_batch)?,
            max_retries: parse_var("MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: parse_var("RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
        };
        booking.validate()?;

        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", 8000)?,
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "seat_reservation=debug,tower_http=debug".to_string()),
                log_format,
                request_timeout_ms: parse_var("REQUEST_TIMEOUT_MS", 5000)?,
                auto_initialize: parse_var("AUTO_INITIALIZE", true)?,
            },
            database,
            booking,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Parse { key, value: raw }),
        Err(_) => Ok(default),
    }
}
