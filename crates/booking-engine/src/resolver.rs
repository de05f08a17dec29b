//! Free/booked slot computation over recurring availability.
//!
//! The functions at the top are pure and shared by the read-only views and
//! the commit-time check in the orchestrator, so both answer the same
//! question the same way.

use chrono::NaiveDate;
use database::{availability, booking, user, AvailabilityRule, Booking, Database, DayOfWeek};
use serde::Serialize;

use crate::error::{BookingError, ValidationError};
use crate::slot::{Slot, SlotState, TimeRange};

/// Longest date range a multi-day view may cover.
pub const MAX_RANGE_DAYS: i64 = 31;

fn rule_range(rule: &AvailabilityRule) -> Option<TimeRange> {
    TimeRange::new(rule.start_time, rule.end_time).ok()
}

fn booking_range(booking: &Booking) -> Option<TimeRange> {
    TimeRange::new(booking.start_time, booking.end_time).ok()
}

/// Active rule windows that apply to `date`, ordered.
fn windows_for(rules: &[AvailabilityRule], date: NaiveDate) -> Vec<TimeRange> {
    let day = DayOfWeek::of(date);
    let mut windows: Vec<TimeRange> = rules
        .iter()
        .filter(|r| r.active && r.day_of_week == day)
        .filter_map(rule_range)
        .collect();
    windows.sort();
    windows.dedup();
    windows
}

/// Live bookings on `date` with their intervals, ordered by start.
fn occupied_on(bookings: &[Booking], date: NaiveDate) -> Vec<(i64, TimeRange)> {
    let mut occupied: Vec<(i64, TimeRange)> = bookings
        .iter()
        .filter(|b| b.is_live() && b.lesson_date == date)
        .filter_map(|b| booking_range(b).map(|r| (b.id, r)))
        .collect();
    occupied.sort_by_key(|(_, r)| *r);
    occupied
}

/// Whether `range` on `date` lies inside one active rule and overlaps no
/// live booking.
pub fn is_bookable(rules: &[AvailabilityRule], bookings: &[Booking], date: NaiveDate, range: TimeRange) -> bool {
    let inside_rule = windows_for(rules, date).iter().any(|w| w.contains(&range));
    inside_rule && !occupied_on(bookings, date).iter().any(|(_, b)| b.overlaps(&range))
}

/// Every active rule window of `date` split into free and booked segments.
pub fn day_schedule(rules: &[AvailabilityRule], bookings: &[Booking], date: NaiveDate) -> Vec<Slot> {
    let occupied = occupied_on(bookings, date);
    let mut slots = Vec::new();

    for window in windows_for(rules, date) {
        let mut cursor = window.start;

        for (booking_id, taken) in occupied.iter().filter(|(_, r)| r.overlaps(&window)) {
            let start = taken.start.max(window.start);
            let end = taken.end.min(window.end);
            if start > cursor {
                slots.push(Slot {
                    range: TimeRange { start: cursor, end: start },
                    state: SlotState::Free,
                });
            }
            slots.push(Slot {
                range: TimeRange { start, end },
                state: SlotState::Booked { booking_id: *booking_id },
            });
            cursor = cursor.max(end);
        }

        if cursor < window.end {
            slots.push(Slot {
                range: TimeRange { start: cursor, end: window.end },
                state: SlotState::Free,
            });
        }
    }

    slots
}

/// Consecutive `minutes`-long candidates laid into each free segment.
pub fn bookable_slots(
    rules: &[AvailabilityRule],
    bookings: &[Booking],
    date: NaiveDate,
    minutes: i64,
) -> Vec<TimeRange> {
    let mut candidates = Vec::new();

    for segment in day_schedule(rules, bookings, date).iter().filter(|s| s.is_free()) {
        let mut start = segment.range.start;
        while let Some(candidate) = TimeRange::starting_at(start, minutes) {
            if candidate.end > segment.range.end {
                break;
            }
            candidates.push(candidate);
            start = candidate.end;
        }
    }

    candidates.sort();
    candidates.dedup();
    candidates
}

/// Schedule of one teacher on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
    pub slots: Vec<Slot>,
}

/// Read-only views over stored rules and bookings.
///
/// Answers are advisory: the orchestrator re-checks inside its transaction.
#[derive(Clone)]
pub struct SlotResolver {
    db: Database,
}

impl SlotResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn load(
        &self,
        teacher_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(Vec<AvailabilityRule>, Vec<Booking>), BookingError> {
        user::get_teacher(self.db.pool(), teacher_id)
            .await
            .map_err(|e| match e {
                database::DatabaseError::NotFound { .. } => BookingError::TeacherNotFound(teacher_id),
                other => other.into(),
            })?;
        let rules = availability::list_rules(self.db.pool(), teacher_id).await?;
        let bookings = booking::live_bookings_between(self.db.pool(), teacher_id, from, to).await?;
        Ok((rules, bookings))
    }

    /// Free and booked segments of one date.
    pub async fn day_view(&self, teacher_id: i64, date: NaiveDate) -> Result<DaySchedule, BookingError> {
        let (rules, bookings) = self.load(teacher_id, date, date).await?;
        Ok(DaySchedule {
            date,
            day_of_week: DayOfWeek::of(date),
            slots: day_schedule(&rules, &bookings, date),
        })
    }

    /// One schedule per date from `from` to `to` inclusive.
    pub async fn range_view(
        &self,
        teacher_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DaySchedule>, BookingError> {
        if to < from {
            return Err(ValidationError::Malformed {
                field: "to",
                reason: "must not be before from".to_string(),
            }
            .into());
        }
        if (to - from).num_days() >= MAX_RANGE_DAYS {
            return Err(ValidationError::RangeTooLong {
                max_days: MAX_RANGE_DAYS,
            }
            .into());
        }

        let (rules, bookings) = self.load(teacher_id, from, to).await?;
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| DaySchedule {
                date,
                day_of_week: DayOfWeek::of(date),
                slots: day_schedule(&rules, &bookings, date),
            })
            .collect())
    }

    /// Candidate intervals of `minutes` length on one date.
    pub async fn candidates(
        &self,
        teacher_id: i64,
        date: NaiveDate,
        minutes: i64,
    ) -> Result<Vec<TimeRange>, BookingError> {
        if minutes <= 0 {
            return Err(ValidationError::Malformed {
                field: "duration",
                reason: "must be a positive number of minutes".to_string(),
            }
            .into());
        }
        let (rules, bookings) = self.load(teacher_id, date, date).await?;
        Ok(bookable_slots(&rules, &bookings, date, minutes))
    }

    /// Whether an exact interval is currently bookable.
    pub async fn is_free(&self, teacher_id: i64, date: NaiveDate, range: TimeRange) -> Result<bool, BookingError> {
        let (rules, bookings) = self.load(teacher_id, date, date).await?;
        Ok(is_bookable(&rules, &bookings, date, range))
    }
}
