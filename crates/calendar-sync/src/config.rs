//! Configuration types for calendar-sync.

use std::env;
use std::time::Duration;

use crate::error::CalendarError;

/// OAuth client and API endpoints of the calendar provider.
#[derive(Clone)]
pub struct CalendarConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where the provider sends the user back after consent.
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
    /// Calendar that lesson events are written to.
    pub calendar_id: String,
    pub scope: String,
    /// Zone attached to the naive lesson times when events are written.
    pub time_zone: String,
    /// Upper bound for each provider call.
    pub timeout: Duration,
}

impl CalendarConfig {
    /// Create a configuration with Google Calendar endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            calendar_id: "primary".to_string(),
            scope: "https://www.googleapis.com/auth/calendar.events".to_string(),
            time_zone: "UTC".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Whether the deployment configured a calendar client at all.
    pub fn is_configured() -> bool {
        env::var("CALENDAR_CLIENT_ID").map(|v| !v.trim().is_empty()).unwrap_or(false)
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CALENDAR_CLIENT_ID` | OAuth client id | (required) |
    /// | `CALENDAR_CLIENT_SECRET` | OAuth client secret | (required) |
    /// | `CALENDAR_REDIRECT_URI` | OAuth callback URL | (required) |
    /// | `CALENDAR_AUTH_URL` | Consent page | Google |
    /// | `CALENDAR_TOKEN_URL` | Token endpoint | Google |
    /// | `CALENDAR_API_URL` | Calendar REST base | Google v3 |
    /// | `CALENDAR_ID` | Target calendar | `primary` |
    /// | `CALENDAR_TIME_ZONE` | Zone of lesson times | `UTC` |
    /// | `CALENDAR_TIMEOUT_SECS` | Per-call timeout | `10` |
    pub fn from_env() -> Result<Self, CalendarError> {
        let required = |name: &str| {
            env::var(name).map_err(|_| CalendarError::Config(format!("{} is required", name)))
        };

        let mut config = Self::new(
            required("CALENDAR_CLIENT_ID")?,
            required("CALENDAR_CLIENT_SECRET")?,
            required("CALENDAR_REDIRECT_URI")?,
        );

        if let Ok(url) = env::var("CALENDAR_AUTH_URL") {
            config.auth_url = url;
        }
        if let Ok(url) = env::var("CALENDAR_TOKEN_URL") {
            config.token_url = url;
        }
        if let Ok(url) = env::var("CALENDAR_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(id) = env::var("CALENDAR_ID") {
            config.calendar_id = id;
        }
        if let Ok(zone) = env::var("CALENDAR_TIME_ZONE") {
            config.time_zone = zone;
        }
        if let Ok(secs) = env::var("CALENDAR_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| CalendarError::Config("CALENDAR_TIMEOUT_SECS must be an integer".to_string()))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Consent page URL carrying an anti-forgery `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
            urlencoding::encode(state),
        )
    }

    /// Events collection URL of the target calendar.
    pub fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// URL of one event.
    pub fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }
}

impl std::fmt::Debug for CalendarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("api_base_url", &self.api_base_url)
            .field("calendar_id", &self.calendar_id)
            .field("time_zone", &self.time_zone)
            .field("timeout", &self.timeout)
            .finish()
    }
}
