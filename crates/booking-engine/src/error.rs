//! Error types for booking operations.

use database::DatabaseError;
use serde::Serialize;
use thiserror::Error;

/// Malformed or missing booking input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    /// End not after start.
    #[error("end time must be after start time")]
    InvertedRange,

    #[error("lesson must start in the future")]
    InPast,

    #[error("lesson has not started yet")]
    NotStarted,

    #[error("date range too long: at most {max_days} days")]
    RangeTooLong { max_days: i64 },
}

/// Broad class of a booking failure, for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, fix and retry.
    Validation,
    /// Slot or record taken; retry with other parameters.
    Conflict,
    /// Not enough funds; retry after topping up.
    Funding,
    /// Money moved without its audit trail. Never user-correctable.
    Consistency,
    Internal,
}

/// Errors that can occur while booking, cancelling or completing lessons.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("teacher {0} not found")]
    TeacherNotFound(i64),

    #[error("booking {0} not found")]
    NotFound(i64),

    #[error("not allowed: {0}")]
    Forbidden(&'static str),

    /// Requested interval is outside availability or overlaps a booking.
    #[error("slot unavailable")]
    SlotUnavailable,

    /// Cancel or complete on a booking that is no longer scheduled.
    #[error("booking {0} is not scheduled")]
    NotScheduled(i64),

    #[error("insufficient balance: required {required_cents}, available {available_cents}")]
    InsufficientBalance {
        required_cents: i64,
        available_cents: i64,
    },

    #[error("ledger inconsistency: {0}")]
    Inconsistency(String),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) => ErrorKind::Validation,
            BookingError::TeacherNotFound(_) | BookingError::NotFound(_) | BookingError::Forbidden(_) => {
                ErrorKind::Validation
            }
            BookingError::SlotUnavailable | BookingError::NotScheduled(_) => ErrorKind::Conflict,
            BookingError::InsufficientBalance { .. } => ErrorKind::Funding,
            BookingError::Inconsistency(_) => ErrorKind::Consistency,
            BookingError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        BookingError::Database(DatabaseError::Sqlx(err))
    }
}
