//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use billing_ingress::IngressConfig;
use booking_engine::EngineConfig;
use calendar_sync::{CalendarConfig, CalendarError};

/// Booking API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Interval of the completion sweep.
    pub sweep_interval: Duration,
    pub engine: EngineConfig,
    pub ingress: IngressConfig,
    /// `None` when no calendar client is configured.
    pub calendar: Option<CalendarConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `BOOKING_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:lessons.db?mode=rwc` |
    /// | `COMPLETION_SWEEP_SECS` | Completion sweep interval | `60` |
    /// | `DEFAULT_HOURLY_RATE_CENTS` | Rate for teachers without one | `2500` |
    /// | `CALENDAR_WAIT_MS` | Wait for calendar sync before answering | `3000` |
    /// | `BILLING_WEBHOOK_SECRET` | Webhook signing secret | (unverified) |
    /// | `CALENDAR_CLIENT_ID` ... | See `CalendarConfig::from_env` | (sync disabled) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("BOOKING_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:lessons.db?mode=rwc".to_string());

        let sweep_secs: u64 = env::var("COMPLETION_SWEEP_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidSweepInterval)?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }

        let calendar = if CalendarConfig::is_configured() {
            Some(CalendarConfig::from_env()?)
        } else {
            None
        };

        Ok(Self {
            addr,
            database_url,
            sweep_interval: Duration::from_secs(sweep_secs),
            engine: EngineConfig::from_env()?,
            ingress: IngressConfig::from_env(),
            calendar,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BOOKING_ADDR format")]
    InvalidAddr,

    #[error("COMPLETION_SWEEP_SECS must be a positive integer")]
    InvalidSweepInterval,

    #[error(transparent)]
    Engine(#[from] booking_engine::ConfigError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}
