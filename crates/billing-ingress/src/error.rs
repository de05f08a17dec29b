//! Error types for billing ingress.

use thiserror::Error;

/// Errors that can occur while accepting a billing event.
#[derive(Debug, Error)]
pub enum IngressError {
    /// Signature header missing while a secret is configured.
    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header: {0}")]
    MalformedSignature(&'static str),

    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    #[error("signature mismatch")]
    SignatureMismatch,

    /// Body is not a valid event envelope.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A handled event lacks a field its handler needs.
    #[error("event {event_id} is missing {field}")]
    MissingField { event_id: String, field: &'static str },

    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),
}

impl IngressError {
    /// Whether the sender failed authentication, as opposed to sending a
    /// bad or unprocessable event.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            IngressError::MissingSignature
                | IngressError::MalformedSignature(_)
                | IngressError::StaleTimestamp
                | IngressError::SignatureMismatch
        )
    }
}

impl From<sqlx::Error> for IngressError {
    fn from(err: sqlx::Error) -> Self {
        IngressError::Database(database::DatabaseError::Sqlx(err))
    }
}
