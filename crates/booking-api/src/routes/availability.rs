//! Teacher availability rule management.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use booking_engine::validation::parse_time;
use booking_engine::BookingError;
use database::{availability, AvailabilityRule, DayOfWeek, NewAvailabilityRule, Role};
use serde::Deserialize;

use crate::context::Caller;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Rule as submitted, with `HH:MM` times.
#[derive(Debug, Deserialize)]
pub struct RuleBody {
    day_of_week: String,
    start_time: String,
    end_time: String,
}

impl RuleBody {
    fn parse(&self) -> Result<NewAvailabilityRule> {
        let day_of_week: DayOfWeek = self.day_of_week.parse().map_err(ApiError::BadRequest)?;
        let start_time = parse_time("start_time", &self.start_time).map_err(BookingError::from)?;
        let end_time = parse_time("end_time", &self.end_time).map_err(BookingError::from)?;
        Ok(NewAvailabilityRule {
            day_of_week,
            start_time,
            end_time,
        })
    }
}

fn require_teacher(caller: &Caller) -> Result<i64> {
    caller.require(Role::Teacher, "only teachers manage availability")?;
    Ok(caller.0.user_id)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    teacher_id: Option<i64>,
}

/// Rules of `teacher_id`, defaulting to the calling teacher.
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AvailabilityRule>>> {
    let teacher_id = match query.teacher_id {
        Some(id) => id,
        None => require_teacher(&caller)?,
    };
    Ok(Json(availability::list_rules(state.db.pool(), teacher_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<RuleBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AvailabilityRule>)> {
    let teacher_id = require_teacher(&caller)?;
    let Json(body) = body?;
    let rule = availability::create_rule(state.db.pool(), teacher_id, &body.parse()?).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn upsert(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<RuleBody>, JsonRejection>,
) -> Result<Json<AvailabilityRule>> {
    let teacher_id = require_teacher(&caller)?;
    let Json(body) = body?;
    Ok(Json(
        availability::upsert_rule(state.db.pool(), teacher_id, &body.parse()?).await?,
    ))
}

pub async fn toggle(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<AvailabilityRule>> {
    let teacher_id = require_teacher(&caller)?;
    Ok(Json(availability::toggle_active(state.db.pool(), teacher_id, id).await?))
}

pub async fn delete(State(state): State<AppState>, caller: Caller, Path(id): Path<i64>) -> Result<StatusCode> {
    let teacher_id = require_teacher(&caller)?;
    availability::delete_rule(state.db.pool(), teacher_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
