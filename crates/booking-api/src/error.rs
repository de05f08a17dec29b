//! API error types.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use billing_ingress::IngressError;
use booking_engine::BookingError;
use calendar_sync::CalendarError;
use database::DatabaseError;
use serde_json::{json, Value};
use tracing::error;

/// Errors returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Ingress(#[from] IngressError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    /// Caller identity headers missing or malformed.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Body missing, not JSON, or fields of the wrong type.
    #[error(transparent)]
    Json(#[from] JsonRejection),
}

const INTERNAL: &str = "internal error";

fn body(code: &str, message: impl Into<String>) -> Value {
    json!({ "error": message.into(), "code": code })
}

impl ApiError {
    fn parts(&self) -> (StatusCode, Value) {
        match self {
            ApiError::Booking(err) => booking_parts(err),
            ApiError::Database(err) => database_parts(err),
            ApiError::Ingress(err) if err.is_authentication() => {
                (StatusCode::UNAUTHORIZED, body("invalid_signature", err.to_string()))
            }
            ApiError::Ingress(IngressError::Database(err)) => database_parts(err),
            ApiError::Ingress(err) => (StatusCode::BAD_REQUEST, body("invalid_event", err.to_string())),
            ApiError::Calendar(err) => calendar_parts(err),
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, body("unauthenticated", *msg)),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, body("forbidden", *msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, body("validation", msg.clone())),
            ApiError::Json(rejection) => (StatusCode::BAD_REQUEST, body("validation", rejection.body_text())),
        }
    }
}

fn booking_parts(err: &BookingError) -> (StatusCode, Value) {
    match err {
        BookingError::Validation(e) => (StatusCode::BAD_REQUEST, body("validation", e.to_string())),
        BookingError::TeacherNotFound(_) | BookingError::NotFound(_) => {
            (StatusCode::NOT_FOUND, body("not_found", err.to_string()))
        }
        BookingError::Forbidden(_) => (StatusCode::FORBIDDEN, body("forbidden", err.to_string())),
        BookingError::SlotUnavailable => (StatusCode::CONFLICT, body("slot_unavailable", err.to_string())),
        BookingError::NotScheduled(_) => (StatusCode::CONFLICT, body("not_scheduled", err.to_string())),
        BookingError::InsufficientBalance {
            required_cents,
            available_cents,
        } => (
            StatusCode::PAYMENT_REQUIRED,
            json!({
                "error": "insufficient balance",
                "code": "insufficient_balance",
                "required_cents": required_cents,
                "available_cents": available_cents,
            }),
        ),
        BookingError::Inconsistency(_) => (StatusCode::INTERNAL_SERVER_ERROR, body("internal", INTERNAL)),
        BookingError::Database(e) => database_parts(e),
    }
}

fn database_parts(err: &DatabaseError) -> (StatusCode, Value) {
    match err {
        DatabaseError::NotFound { .. } => (StatusCode::NOT_FOUND, body("not_found", err.to_string())),
        DatabaseError::AlreadyExists { .. } => (StatusCode::CONFLICT, body("conflict", err.to_string())),
        DatabaseError::Invalid { .. } => (StatusCode::BAD_REQUEST, body("validation", err.to_string())),
        DatabaseError::InsufficientBalance {
            required_cents,
            available_cents,
        } => booking_parts(&BookingError::InsufficientBalance {
            required_cents: *required_cents,
            available_cents: *available_cents,
        }),
        DatabaseError::Sqlx(_) | DatabaseError::Migration(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, body("internal", INTERNAL))
        }
    }
}

fn calendar_parts(err: &CalendarError) -> (StatusCode, Value) {
    match err {
        CalendarError::InvalidState => (StatusCode::BAD_REQUEST, body("invalid_state", err.to_string())),
        CalendarError::NotConnected(_) => (StatusCode::NOT_FOUND, body("not_found", err.to_string())),
        CalendarError::Disabled => (StatusCode::SERVICE_UNAVAILABLE, body("calendar_disabled", err.to_string())),
        CalendarError::Database(e) => database_parts(e),
        _ => (StatusCode::BAD_GATEWAY, body("calendar_provider", "calendar provider request failed")),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
