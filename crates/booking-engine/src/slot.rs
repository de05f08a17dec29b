//! Half-open time intervals and schedule segments.

use chrono::{Duration, NaiveTime};
use serde::Serialize;

use crate::error::ValidationError;

/// A `[start, end)` interval within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// Empty and inverted intervals are invalid input.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvertedRange);
        }
        Ok(Self { start, end })
    }

    /// `start` plus `minutes`, or `None` past midnight.
    pub fn starting_at(start: NaiveTime, minutes: i64) -> Option<Self> {
        if minutes <= 0 {
            return None;
        }
        let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(minutes));
        if wrapped != 0 || end <= start {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies fully inside this interval.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Whether a segment of a schedule is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SlotState {
    Free,
    Booked { booking_id: i64 },
}

/// One segment of a teacher's day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    #[serde(flatten)]
    pub range: TimeRange,
    #[serde(flatten)]
    pub state: SlotState,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        self.state == SlotState::Free
    }
}
