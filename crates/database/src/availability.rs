//! Teacher availability rules.
//!
//! `(teacher_id, day_of_week, start_time)` is unique. Bookings hold no
//! reference to a rule, so rules can be deleted at any time.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{AvailabilityRule, DayOfWeek, NewAvailabilityRule};

fn check_range(rule: &NewAvailabilityRule) -> Result<()> {
    if rule.start_time >= rule.end_time {
        return Err(DatabaseError::Invalid {
            field: "end_time",
            reason: format!(
                "must be after start_time ({} >= {})",
                rule.start_time.format("%H:%M"),
                rule.end_time.format("%H:%M")
            ),
        });
    }
    Ok(())
}

fn rule_key(teacher_id: i64, rule: &NewAvailabilityRule) -> String {
    format!(
        "{}/{}/{}",
        teacher_id,
        rule.day_of_week,
        rule.start_time.format("%H:%M")
    )
}

/// Create a rule. A rule already starting at the same day and time is a conflict.
pub async fn create_rule(
    pool: &SqlitePool,
    teacher_id: i64,
    rule: &NewAvailabilityRule,
) -> Result<AvailabilityRule> {
    check_range(rule)?;

    sqlx::query_as::<_, AvailabilityRule>(
        r#"
        INSERT INTO availability_rules (teacher_id, day_of_week, start_time, end_time)
        VALUES (?, ?, ?, ?)
        RETURNING id, teacher_id, day_of_week, start_time, end_time, active
        "#,
    )
    .bind(teacher_id)
    .bind(rule.day_of_week)
    .bind(rule.start_time)
    .bind(rule.end_time)
    .fetch_one(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "AvailabilityRule", rule_key(teacher_id, rule)))
}

/// Create a rule, or replace the end time of the one starting at the same
/// day and time. The stored rule is re-activated.
pub async fn upsert_rule(
    pool: &SqlitePool,
    teacher_id: i64,
    rule: &NewAvailabilityRule,
) -> Result<AvailabilityRule> {
    check_range(rule)?;

    let stored = sqlx::query_as::<_, AvailabilityRule>(
        r#"
        INSERT INTO availability_rules (teacher_id, day_of_week, start_time, end_time)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(teacher_id, day_of_week, start_time) DO UPDATE SET
            end_time = excluded.end_time,
            active = 1
        RETURNING id, teacher_id, day_of_week, start_time, end_time, active
        "#,
    )
    .bind(teacher_id)
    .bind(rule.day_of_week)
    .bind(rule.start_time)
    .bind(rule.end_time)
    .fetch_one(pool)
    .await?;

    Ok(stored)
}

/// Enable or disable a rule owned by `teacher_id`.
pub async fn set_active(
    pool: &SqlitePool,
    teacher_id: i64,
    rule_id: i64,
    active: bool,
) -> Result<AvailabilityRule> {
    sqlx::query_as::<_, AvailabilityRule>(
        r#"
        UPDATE availability_rules
        SET active = ?
        WHERE id = ? AND teacher_id = ?
        RETURNING id, teacher_id, day_of_week, start_time, end_time, active
        "#,
    )
    .bind(active)
    .bind(rule_id)
    .bind(teacher_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "AvailabilityRule",
        id: rule_id.to_string(),
    })
}

/// Flip the active flag of a rule owned by `teacher_id`.
pub async fn toggle_active(pool: &SqlitePool, teacher_id: i64, rule_id: i64) -> Result<AvailabilityRule> {
    sqlx::query_as::<_, AvailabilityRule>(
        r#"
        UPDATE availability_rules
        SET active = NOT active
        WHERE id = ? AND teacher_id = ?
        RETURNING id, teacher_id, day_of_week, start_time, end_time, active
        "#,
    )
    .bind(rule_id)
    .bind(teacher_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "AvailabilityRule",
        id: rule_id.to_string(),
    })
}

/// Delete a rule owned by `teacher_id`.
pub async fn delete_rule(pool: &SqlitePool, teacher_id: i64, rule_id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM availability_rules
        WHERE id = ? AND teacher_id = ?
        "#,
    )
    .bind(rule_id)
    .bind(teacher_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "AvailabilityRule",
            id: rule_id.to_string(),
        });
    }

    Ok(())
}

/// All rules of a teacher, active or not, in weekly order.
pub async fn list_rules(pool: &SqlitePool, teacher_id: i64) -> Result<Vec<AvailabilityRule>> {
    let mut rules = sqlx::query_as::<_, AvailabilityRule>(
        r#"
        SELECT id, teacher_id, day_of_week, start_time, end_time, active
        FROM availability_rules
        WHERE teacher_id = ?
        ORDER BY start_time
        "#,
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    // Day names do not sort chronologically in SQL.
    rules.sort_by_key(|r| (r.day_of_week, r.start_time));
    Ok(rules)
}

/// Active rules of a teacher for one weekday, ordered by start time.
pub async fn active_rules_for_day(
    conn: &mut SqliteConnection,
    teacher_id: i64,
    day: DayOfWeek,
) -> Result<Vec<AvailabilityRule>> {
    let rules = sqlx::query_as::<_, AvailabilityRule>(
        r#"
        SELECT id, teacher_id, day_of_week, start_time, end_time, active
        FROM availability_rules
        WHERE teacher_id = ? AND day_of_week = ? AND active = 1
        ORDER BY start_time
        "#,
    )
    .bind(teacher_id)
    .bind(day)
    .fetch_all(conn)
    .await?;

    Ok(rules)
}
