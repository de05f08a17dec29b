//! Error types for calendar-sync.

use thiserror::Error;

/// Errors that can occur when talking to the calendar provider.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the provider.
    #[error("provider error {status}: {message}")]
    Provider { status: u16, message: String },

    /// The user never connected a calendar.
    #[error("calendar not connected for user {0}")]
    NotConnected(i64),

    /// The stored grant was revoked; the user must re-authorize.
    #[error("calendar access revoked for user {0}")]
    Revoked(i64),

    /// Refreshing an expired token failed; the account is now revoked.
    #[error("token refresh failed for user {user_id}: {reason}")]
    RefreshFailed { user_id: i64, reason: String },

    /// A provider call exceeded the configured timeout.
    #[error("calendar provider timed out")]
    Timeout,

    /// OAuth state token unknown, expired or already used.
    #[error("invalid or expired OAuth state")]
    InvalidState,

    /// Calendar sync is not configured for this deployment.
    #[error("calendar sync is disabled")]
    Disabled,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Credential storage failed.
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),
}
