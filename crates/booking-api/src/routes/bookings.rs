//! Booking lifecycle endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use booking_engine::{BookingOutcome, BookingRequest, CalendarStatus, CancellationOutcome};
use database::{booking, Booking, Role};
use serde::{Deserialize, Serialize};

use crate::context::Caller;
use crate::error::{ApiError, Result};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Body returned for a committed booking.
#[derive(Debug, Serialize)]
pub struct BookingCreated {
    pub booking_id: i64,
    pub trial: bool,
    /// `null` unless calendar sync finished with an event.
    pub calendar_event_id: Option<String>,
    pub calendar_status: CalendarStatus,
    pub cost_cents: i64,
    pub booking: Booking,
}

impl From<BookingOutcome> for BookingCreated {
    fn from(outcome: BookingOutcome) -> Self {
        Self {
            booking_id: outcome.booking.id,
            trial: outcome.trial,
            calendar_event_id: outcome.calendar_event_id().map(str::to_string),
            calendar_status: outcome.calendar,
            cost_cents: outcome.cost_cents,
            booking: outcome.booking,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    request: std::result::Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingCreated>)> {
    let Json(request) = request?;
    let outcome = state.engine.book(&ctx, &request).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

pub async fn cancel(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<i64>,
) -> Result<Json<CancellationOutcome>> {
    Ok(Json(state.engine.cancel(&ctx, id).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<i64>,
) -> Result<Json<Booking>> {
    Ok(Json(state.engine.complete(&ctx, id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    limit: Option<i64>,
    /// Admin only.
    student_id: Option<i64>,
    /// Admin only.
    teacher_id: Option<i64>,
}

/// Bookings of the caller, newest lesson first.
pub async fn list(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let pool = state.db.pool();

    let bookings = match ctx.role {
        Role::Student => booking::list_for_student(pool, ctx.user_id, limit).await?,
        Role::Teacher => booking::list_for_teacher(pool, ctx.user_id, limit).await?,
        Role::Admin => match (query.student_id, query.teacher_id) {
            (Some(student_id), None) => booking::list_for_student(pool, student_id, limit).await?,
            (None, Some(teacher_id)) => booking::list_for_teacher(pool, teacher_id, limit).await?,
            _ => {
                return Err(ApiError::BadRequest(
                    "admins must pass exactly one of student_id or teacher_id".to_string(),
                ))
            }
        },
    };

    Ok(Json(bookings))
}
