//! Lesson pricing.

use crate::error::ValidationError;
use crate::slot::TimeRange;

/// Cost in cents of a lesson at `hourly_rate_cents`, rounded up to the cent.
///
/// Rates too large to price in `i64` cents are rejected.
pub fn lesson_cost(hourly_rate_cents: i64, range: &TimeRange) -> Result<i64, ValidationError> {
    hourly_rate_cents
        .checked_mul(range.minutes())
        .and_then(|total| total.checked_add(59))
        .map(|total| total / 60)
        .ok_or_else(|| ValidationError::Malformed {
            field: "hourly_rate_cents",
            reason: format!("rate {} is too large to price a lesson", hourly_rate_cents),
        })
}
