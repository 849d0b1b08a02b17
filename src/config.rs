//! Environment-driven configuration.

use crate::error::ConfigError;
use crate::models::MarketCategory;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 5;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1800);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(25);
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(20);
pub const DEFAULT_REST_URL: &str = "https://api.bybit.com";
pub const DEFAULT_WS_LINEAR_URL: &str = "wss://stream.bybit.com/v5/public/linear";
pub const DEFAULT_WS_SPOT_URL: &str = "wss://stream.bybit.com/v5/public/spot";
pub const DEFAULT_QUOTE_SUFFIX: &str = "USDT";
pub const DEFAULT_PORT: u16 = 8080;

/// Deployment environment (`APP_ENV`), defaults to `sandbox`.
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

/// PostgreSQL DSN for the favorites store, if configured.
pub fn get_database_url() -> Option<String> {
    env::var("DB_DSN").ok().filter(|v| !v.trim().is_empty())
}

/// Telegram bot token, if configured.
pub fn get_telegram_token() -> Option<String> {
    env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

pub fn get_port() -> Result<u16, ConfigError> {
    parse_var("PORT", DEFAULT_PORT)
}

/// Tunables of the monitoring engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub chunk_size: usize,
    pub cooldown: Duration,
    pub read_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub rest_url: String,
    pub ws_linear_url: String,
    pub ws_spot_url: String,
    pub quote_suffix: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cooldown: DEFAULT_COOLDOWN,
            read_timeout: DEFAULT_READ_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT,
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_linear_url: DEFAULT_WS_LINEAR_URL.to_string(),
            ws_spot_url: DEFAULT_WS_SPOT_URL.to_string(),
            quote_suffix: DEFAULT_QUOTE_SUFFIX.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let chunk_size: usize = parse_var("CHUNK_SIZE", defaults.chunk_size)?;
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            chunk_size,
            cooldown: Duration::from_secs(parse_var(
                "COOLDOWN_SECONDS",
                defaults.cooldown.as_secs(),
            )?),
            read_timeout: Duration::from_secs(parse_var(
                "READ_TIMEOUT_SECONDS",
                defaults.read_timeout.as_secs(),
            )?),
            heartbeat_interval: Duration::from_secs(parse_var(
                "HEARTBEAT_SECONDS",
                defaults.heartbeat_interval.as_secs(),
            )?),
            rest_url: url_var("BYBIT_REST_URL", defaults.rest_url)?,
            ws_linear_url: url_var("BYBIT_WS_LINEAR_URL", defaults.ws_linear_url)?,
            ws_spot_url: url_var("BYBIT_WS_SPOT_URL", defaults.ws_spot_url)?,
            quote_suffix: env::var("QUOTE_SUFFIX").unwrap_or(defaults.quote_suffix),
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn with_rest_url(mut self, rest_url: impl Into<String>) -> Self {
        self.rest_url = rest_url.into();
        self
    }

    /// Streaming endpoint for a market category.
    pub fn stream_url(&self, category: MarketCategory) -> &str {
        match category {
            MarketCategory::Linear => &self.ws_linear_url,
            MarketCategory::Spot => &self.ws_spot_url,
        }
    }

    /// Cooldown expressed in exchange timestamp units (milliseconds).
    pub fn cooldown_millis(&self) -> i64 {
        i64::try_from(self.cooldown.as_millis()).unwrap_or(i64::MAX)
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn url_var(key: &'static str, default: String) -> Result<String, ConfigError> {
    let value = env::var(key).unwrap_or(default);
    url::Url::parse(&value).map_err(|_| ConfigError::Invalid {
        key,
        value: value.clone(),
    })?;
    Ok(value)
}
