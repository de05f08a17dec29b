//! Database models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Day of the week an availability rule recurs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// The weekday a calendar date falls on.
    pub fn of(date: NaiveDate) -> Self {
        use chrono::Datelike;
        date.weekday().into()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    /// Accepts full or three-letter English names, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Ok(DayOfWeek::Monday),
            "tuesday" | "tue" => Ok(DayOfWeek::Tuesday),
            "wednesday" | "wed" => Ok(DayOfWeek::Wednesday),
            "thursday" | "thu" => Ok(DayOfWeek::Thursday),
            "friday" | "fri" => Ok(DayOfWeek::Friday),
            "saturday" | "sat" => Ok(DayOfWeek::Saturday),
            "sunday" | "sun" => Ok(DayOfWeek::Sunday),
            other => Err(format!("unknown day of week '{}'", other)),
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a booked lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// Subscription state as last reported by the billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

/// Stored state of a calendar account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CalendarAccountStatus {
    Connected,
    Revoked,
}

/// A student, teacher or admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Teacher price per hour in cents, if configured.
    pub hourly_rate_cents: Option<i64>,
    pub created_at: String,
}

/// Fields needed to register a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub hourly_rate_cents: Option<i64>,
}

/// A teacher's recurring weekly window of open time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AvailabilityRule {
    pub id: i64,
    pub teacher_id: i64,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Disabled rules are ignored for feasibility, as if deleted.
    pub active: bool,
}

/// Fields of a rule as submitted by a teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAvailabilityRule {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A lesson booking. Times are a snapshot, not a rule reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub teacher_id: i64,
    pub student_id: i64,
    pub lesson_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub is_trial: bool,
    /// Debit that paid for the lesson; `None` for trial lessons.
    pub funding_transaction_id: Option<i64>,
    pub teacher_calendar_event_id: Option<String>,
    pub student_calendar_event_id: Option<String>,
    pub category: String,
    pub created_at: String,
}

impl Booking {
    /// Whether this booking still occupies its interval.
    pub fn is_live(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }
}

/// Fields written when a booking is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub teacher_id: i64,
    pub student_id: i64,
    pub lesson_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_trial: bool,
    pub funding_transaction_id: Option<i64>,
    pub category: String,
}

/// Cached wallet state for a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub student_id: i64,
    pub balance_cents: i64,
    pub trial_credits: i64,
    pub trial_used: bool,
    pub updated_at: String,
}

/// One row of the append-only wallet ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub id: i64,
    pub student_id: i64,
    /// Signed: debits are negative.
    pub amount_cents: i64,
    /// Idempotency key of the logical event behind this row.
    pub reference: String,
    pub description: String,
    pub created_at: String,
}

/// Subscription mirrored from the billing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub student_id: i64,
    pub external_subscription_id: String,
    pub billing_cycle_day: i64,
    pub status: SubscriptionStatus,
    pub payment_failed: bool,
    pub updated_at: String,
}

/// OAuth credentials for a user's external calendar.
#[derive(Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CalendarAccount {
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub status: CalendarAccountStatus,
    pub updated_at: String,
}

impl fmt::Debug for CalendarAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarAccount")
            .field("user_id", &self.user_id)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("status", &self.status)
            .finish()
    }
}
