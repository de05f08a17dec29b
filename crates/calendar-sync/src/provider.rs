//! Calendar provider seam.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use database::Booking;
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Only present on the first exchange, or when the provider rotates it.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// A lesson as written to an external calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonEvent {
    pub summary: String,
    pub description: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl LessonEvent {
    /// Event text and timing for a booked lesson.
    pub fn for_booking(booking: &Booking) -> Self {
        Self {
            summary: format!("{} lesson", capitalize(&booking.category)),
            description: format!("Booking #{}", booking.id),
            date: booking.lesson_date,
            start: booking.start_time,
            end: booking.end_time,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Operations the sync layer needs from a calendar provider.
///
/// Implementations perform one remote call per method and never retry.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Consent page URL for an OAuth flow carrying `state`.
    fn authorization_url(&self, state: &str) -> Result<String, CalendarError>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, CalendarError>;

    /// Obtain a new access token from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, CalendarError>;

    /// Create an event and return its provider id.
    async fn create_event(&self, access_token: &str, event: &LessonEvent) -> Result<String, CalendarError>;

    /// Replace the timing and text of an existing event.
    async fn update_event(
        &self,
        access_token: &str,
        event_id: &str,
        event: &LessonEvent,
    ) -> Result<(), CalendarError>;

    /// Delete an event. Deleting an event that no longer exists succeeds.
    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<(), CalendarError>;
}

/// Provider used when no calendar client is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait]
impl CalendarProvider for DisabledProvider {
    fn authorization_url(&self, _state: &str) -> Result<String, CalendarError> {
        Err(CalendarError::Disabled)
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant, CalendarError> {
        Err(CalendarError::Disabled)
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, CalendarError> {
        Err(CalendarError::Disabled)
    }

    async fn create_event(&self, _access_token: &str, _event: &LessonEvent) -> Result<String, CalendarError> {
        Err(CalendarError::Disabled)
    }

    async fn update_event(
        &self,
        _access_token: &str,
        _event_id: &str,
        _event: &LessonEvent,
    ) -> Result<(), CalendarError> {
        Err(CalendarError::Disabled)
    }

    async fn delete_event(&self, _access_token: &str, _event_id: &str) -> Result<(), CalendarError> {
        Err(CalendarError::Disabled)
    }
}
