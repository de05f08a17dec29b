//! Read-only schedule views.

use axum::extract::{Path, Query, State};
use axum::Json;
use booking_engine::validation::parse_date;
use booking_engine::{DaySchedule, TimeRange};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    date: String,
    /// Lesson length in minutes; adds bookable candidates to the answer.
    duration: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    #[serde(flatten)]
    schedule: DaySchedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<TimeRange>>,
}

pub async fn day(
    State(state): State<AppState>,
    Path(teacher_id): Path<i64>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>> {
    let date = parse_date("date", &query.date).map_err(booking_engine::BookingError::from)?;
    let schedule = state.resolver.day_view(teacher_id, date).await?;
    let candidates = match query.duration {
        Some(minutes) => Some(state.resolver.candidates(teacher_id, date, minutes).await?),
        None => None,
    };
    Ok(Json(SlotsResponse { schedule, candidates }))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    from: String,
    to: String,
}

pub async fn range(
    State(state): State<AppState>,
    Path(teacher_id): Path<i64>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<DaySchedule>>> {
    let from = parse_date("from", &query.from).map_err(booking_engine::BookingError::from)?;
    let to = parse_date("to", &query.to).map_err(booking_engine::BookingError::from)?;
    Ok(Json(state.resolver.range_view(teacher_id, from, to).await?))
}
