//! Parsing of raw booking requests.
//!
//! Everything here is pure: a request that fails validation never reaches
//! the database.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::error::ValidationError;
use crate::slot::TimeRange;

/// Category stored when the request names none.
pub const DEFAULT_CATEGORY: &str = "lesson";

/// Booking request as received from a client. Every field is optional so
/// that missing ones are reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    pub teacher_id: Option<i64>,
    /// `YYYY-MM-DD`.
    pub lesson_date: Option<String>,
    /// `HH:MM`, seconds accepted.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub category: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    pub teacher_id: i64,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub category: String,
}

impl BookingRequest {
    pub fn new(teacher_id: i64, lesson_date: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            teacher_id: Some(teacher_id),
            lesson_date: Some(lesson_date.to_string()),
            start_time: Some(start_time.to_string()),
            end_time: Some(end_time.to_string()),
            category: None,
        }
    }

    /// Check presence and format, and that the lesson starts after `now`.
    pub fn validate(&self, now: NaiveDateTime) -> Result<ValidatedBooking, ValidationError> {
        let teacher_id = self.teacher_id.ok_or(ValidationError::MissingField("teacher_id"))?;
        let date = parse_date("lesson_date", required("lesson_date", &self.lesson_date)?)?;
        let start = parse_time("start_time", required("start_time", &self.start_time)?)?;
        let end = parse_time("end_time", required("end_time", &self.end_time)?)?;

        let range = TimeRange::new(start, end)?;
        if date.and_time(start) <= now {
            return Err(ValidationError::InPast);
        }

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_CATEGORY.to_string(),
            Some(c) => c.to_lowercase(),
        };

        Ok(ValidatedBooking {
            teacher_id,
            date,
            range,
            category,
        })
    }
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Err(ValidationError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::Malformed {
        field,
        reason: format!("expected YYYY-MM-DD, got '{}'", value),
    })
}

/// Parse an `HH:MM` or `HH:MM:SS` time.
pub fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, ValidationError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ValidationError::Malformed {
            field,
            reason: format!("expected HH:MM, got '{}'", value),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_valid_request() {
        let booking = BookingRequest::new(3, "2025-01-06", "10:00", "11:00")
            .validate(now())
            .unwrap();
        assert_eq!(booking.teacher_id, 3);
        assert_eq!(booking.date, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(booking.range.minutes(), 60);
        assert_eq!(booking.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_missing_fields_named() {
        let mut request = BookingRequest::new(3, "2025-01-06", "10:00", "11:00");
        request.start_time = Some("  ".to_string());
        assert_eq!(
            request.validate(now()),
            Err(ValidationError::MissingField("start_time"))
        );

        let request = BookingRequest::default();
        assert_eq!(
            request.validate(now()),
            Err(ValidationError::MissingField("teacher_id"))
        );
    }

    #[test]
    fn test_malformed_values() {
        let result = BookingRequest::new(3, "06/01/2025", "10:00", "11:00").validate(now());
        assert!(matches!(
            result,
            Err(ValidationError::Malformed { field: "lesson_date", .. })
        ));

        let result = BookingRequest::new(3, "2025-01-06", "25:00", "11:00").validate(now());
        assert!(matches!(
            result,
            Err(ValidationError::Malformed { field: "start_time", .. })
        ));
    }

    #[test]
    fn test_inverted_range() {
        let result = BookingRequest::new(3, "2025-01-06", "11:00", "10:00").validate(now());
        assert_eq!(result, Err(ValidationError::InvertedRange));
    }

    #[test]
    fn test_past_and_current_start_rejected() {
        let result = BookingRequest::new(3, "2024-12-31", "10:00", "11:00").validate(now());
        assert_eq!(result, Err(ValidationError::InPast));

        let result = BookingRequest::new(3, "2025-01-01", "12:00", "13:00").validate(now());
        assert_eq!(result, Err(ValidationError::InPast));

        assert!(BookingRequest::new(3, "2025-01-01", "12:01", "13:00")
            .validate(now())
            .is_ok());
    }

    #[test]
    fn test_seconds_accepted() {
        assert_eq!(
            parse_time("start_time", "09:30:00").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
    }
}
