//! Engine settings.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings of the booking orchestrator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hourly rate used for teachers without one, in cents.
    pub default_hourly_rate_cents: i64,
    /// How long `book` waits for calendar sync before answering `Pending`.
    pub calendar_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_hourly_rate_cents: 2500,
            calendar_wait: Duration::from_secs(3),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DEFAULT_HOURLY_RATE_CENTS` | `2500` |
    /// | `CALENDAR_WAIT_MS` | `3000` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("DEFAULT_HOURLY_RATE_CENTS") {
            let rate: i64 = value.parse().map_err(|_| ConfigError::Invalid {
                name: "DEFAULT_HOURLY_RATE_CENTS",
                reason: format!("'{}' is not an integer", value),
            })?;
            if rate <= 0 {
                return Err(ConfigError::Invalid {
                    name: "DEFAULT_HOURLY_RATE_CENTS",
                    reason: "must be positive".to_string(),
                });
            }
            config.default_hourly_rate_cents = rate;
        }

        if let Ok(value) = env::var("CALENDAR_WAIT_MS") {
            let ms: u64 = value.parse().map_err(|_| ConfigError::Invalid {
                name: "CALENDAR_WAIT_MS",
                reason: format!("'{}' is not an integer", value),
            })?;
            config.calendar_wait = Duration::from_millis(ms);
        }

        Ok(config)
    }
}
