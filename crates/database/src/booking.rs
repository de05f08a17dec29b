//! Booking ledger.
//!
//! No two live (non-cancelled) bookings of a teacher may overlap on a date.
//! Overlap is checked by the caller inside its transaction; the partial
//! unique index on `(teacher_id, lesson_date, start_time)` backs it up for
//! the identical-start race.

use chrono::{NaiveDate, NaiveTime};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Booking, NewBooking};

const BOOKING_COLUMNS: &str = "id, teacher_id, student_id, lesson_date, start_time, end_time, \
    status, is_trial, funding_transaction_id, teacher_calendar_event_id, \
    student_calendar_event_id, category, created_at";

/// Insert a booking row and return it.
///
/// A live booking with the same teacher, date and start maps to `AlreadyExists`.
pub async fn insert_booking(conn: &mut SqliteConnection, booking: &NewBooking) -> Result<Booking> {
    let query = format!(
        r#"
        INSERT INTO bookings (
            teacher_id, student_id, lesson_date, start_time, end_time,
            is_trial, funding_transaction_id, category
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {BOOKING_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Booking>(&query)
        .bind(booking.teacher_id)
        .bind(booking.student_id)
        .bind(booking.lesson_date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.is_trial)
        .bind(booking.funding_transaction_id)
        .bind(&booking.category)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            DatabaseError::from_insert(
                e,
                "Booking",
                format!(
                    "{}/{}/{}",
                    booking.teacher_id,
                    booking.lesson_date,
                    booking.start_time.format("%H:%M")
                ),
            )
        })
}

/// Get a booking by ID.
pub async fn get_booking(pool: &SqlitePool, id: i64) -> Result<Booking> {
    let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?");

    sqlx::query_as::<_, Booking>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Booking",
            id: id.to_string(),
        })
}

/// Live bookings of a teacher on a date, ordered by start time.
pub async fn live_bookings_on(
    conn: &mut SqliteConnection,
    teacher_id: i64,
    date: NaiveDate,
) -> Result<Vec<Booking>> {
    let query = format!(
        r#"
        SELECT {BOOKING_COLUMNS}
        FROM bookings
        WHERE teacher_id = ? AND lesson_date = ? AND status != 'cancelled'
        ORDER BY start_time
        "#
    );

    let rows = sqlx::query_as::<_, Booking>(&query)
        .bind(teacher_id)
        .bind(date)
        .fetch_all(conn)
        .await?;

    Ok(rows)
}

/// Live bookings of a teacher between two dates inclusive.
pub async fn live_bookings_between(
    pool: &SqlitePool,
    teacher_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Booking>> {
    let query = format!(
        r#"
        SELECT {BOOKING_COLUMNS}
        FROM bookings
        WHERE teacher_id = ? AND lesson_date >= ? AND lesson_date <= ? AND status != 'cancelled'
        ORDER BY lesson_date, start_time
        "#
    );

    let rows = sqlx::query_as::<_, Booking>(&query)
        .bind(teacher_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Whether a live booking starts at exactly this teacher, date and time.
pub async fn live_booking_exists(
    conn: &mut SqliteConnection,
    teacher_id: i64,
    date: NaiveDate,
    start: NaiveTime,
) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM bookings
        WHERE teacher_id = ? AND lesson_date = ? AND start_time = ? AND status != 'cancelled'
        "#,
    )
    .bind(teacher_id)
    .bind(date)
    .bind(start)
    .fetch_optional(conn)
    .await?;

    Ok(found.is_some())
}

/// Bookings of a student, newest lesson first.
pub async fn list_for_student(pool: &SqlitePool, student_id: i64, limit: i64) -> Result<Vec<Booking>> {
    let query = format!(
        r#"
        SELECT {BOOKING_COLUMNS}
        FROM bookings
        WHERE student_id = ?
        ORDER BY lesson_date DESC, start_time DESC
        LIMIT ?
        "#
    );

    let rows = sqlx::query_as::<_, Booking>(&query)
        .bind(student_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Bookings of a teacher, newest lesson first.
pub async fn list_for_teacher(pool: &SqlitePool, teacher_id: i64, limit: i64) -> Result<Vec<Booking>> {
    let query = format!(
        r#"
        SELECT {BOOKING_COLUMNS}
        FROM bookings
        WHERE teacher_id = ?
        ORDER BY lesson_date DESC, start_time DESC
        LIMIT ?
        "#
    );

    let rows = sqlx::query_as::<_, Booking>(&query)
        .bind(teacher_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Move a scheduled booking to cancelled.
///
/// Returns the updated row, or `None` if it was not scheduled (already
/// cancelled or completed) so concurrent cancellations act once.
pub async fn cancel_scheduled(conn: &mut SqliteConnection, id: i64) -> Result<Option<Booking>> {
    let query = format!(
        r#"
        UPDATE bookings
        SET status = 'cancelled'
        WHERE id = ? AND status = 'scheduled'
        RETURNING {BOOKING_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, Booking>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

/// Move one scheduled booking to completed.
pub async fn complete_scheduled(pool: &SqlitePool, id: i64) -> Result<Option<Booking>> {
    let query = format!(
        r#"
        UPDATE bookings
        SET status = 'completed'
        WHERE id = ? AND status = 'scheduled'
        RETURNING {BOOKING_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, Booking>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Complete every scheduled lesson that ended at or before `date` `time`.
pub async fn complete_elapsed(pool: &SqlitePool, date: NaiveDate, time: NaiveTime) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = 'completed'
        WHERE status = 'scheduled'
          AND (lesson_date < ? OR (lesson_date = ? AND end_time <= ?))
        "#,
    )
    .bind(date)
    .bind(date)
    .bind(time)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Record calendar event ids created after the booking committed.
///
/// `None` leaves the stored value untouched. Only scheduled bookings take
/// ids; returns `false` when the booking was cancelled or completed first,
/// in which case the caller owns the events it created.
pub async fn set_calendar_event_ids(
    pool: &SqlitePool,
    id: i64,
    teacher_event_id: Option<&str>,
    student_event_id: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET teacher_calendar_event_id = COALESCE(?, teacher_calendar_event_id),
            student_calendar_event_id = COALESCE(?, student_calendar_event_id)
        WHERE id = ? AND status = 'scheduled'
        "#,
    )
    .bind(teacher_event_id)
    .bind(student_event_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Forget calendar event ids after the events were removed.
pub async fn clear_calendar_event_ids(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE bookings
        SET teacher_calendar_event_id = NULL,
            student_calendar_event_id = NULL
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
