//! Subscription state mirrored from billing-provider callbacks.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Subscription, SubscriptionStatus};

fn check_cycle_day(day: i64) -> Result<()> {
    if !(1..=31).contains(&day) {
        return Err(DatabaseError::Invalid {
            field: "billing_cycle_day",
            reason: format!("must be between 1 and 31, got {}", day),
        });
    }
    Ok(())
}

/// Create or re-activate a subscription keyed by its provider id.
///
/// Applying the same activation twice leaves one row.
pub async fn activate(
    conn: &mut SqliteConnection,
    student_id: i64,
    external_subscription_id: &str,
    billing_cycle_day: i64,
) -> Result<Subscription> {
    check_cycle_day(billing_cycle_day)?;

    let row = sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (student_id, external_subscription_id, billing_cycle_day, status)
        VALUES (?, ?, ?, 'active')
        ON CONFLICT(external_subscription_id) DO UPDATE SET
            student_id = excluded.student_id,
            billing_cycle_day = excluded.billing_cycle_day,
            status = 'active',
            payment_failed = 0,
            updated_at = datetime('now')
        RETURNING id, student_id, external_subscription_id, billing_cycle_day, status,
                  payment_failed, updated_at
        "#,
    )
    .bind(student_id)
    .bind(external_subscription_id)
    .bind(billing_cycle_day)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

/// Update status and, when given, the billing-cycle day.
///
/// Returns `None` for an unknown subscription id.
pub async fn update_status(
    conn: &mut SqliteConnection,
    external_subscription_id: &str,
    status: SubscriptionStatus,
    billing_cycle_day: Option<i64>,
) -> Result<Option<Subscription>> {
    if let Some(day) = billing_cycle_day {
        check_cycle_day(day)?;
    }

    let row = sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET status = ?,
            billing_cycle_day = COALESCE(?, billing_cycle_day),
            updated_at = datetime('now')
        WHERE external_subscription_id = ?
        RETURNING id, student_id, external_subscription_id, billing_cycle_day, status,
                  payment_failed, updated_at
        "#,
    )
    .bind(status)
    .bind(billing_cycle_day)
    .bind(external_subscription_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Set or clear the failed-payment flag.
pub async fn set_payment_failed(
    conn: &mut SqliteConnection,
    external_subscription_id: &str,
    failed: bool,
) -> Result<Option<Subscription>> {
    let row = sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET payment_failed = ?,
            updated_at = datetime('now')
        WHERE external_subscription_id = ?
        RETURNING id, student_id, external_subscription_id, billing_cycle_day, status,
                  payment_failed, updated_at
        "#,
    )
    .bind(failed)
    .bind(external_subscription_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Get a subscription by provider id.
pub async fn get_by_external_id(pool: &SqlitePool, external_subscription_id: &str) -> Result<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, student_id, external_subscription_id, billing_cycle_day, status,
               payment_failed, updated_at
        FROM subscriptions
        WHERE external_subscription_id = ?
        "#,
    )
    .bind(external_subscription_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Subscription",
        id: external_subscription_id.to_string(),
    })
}

/// Subscriptions of a student, newest first.
pub async fn list_for_student(pool: &SqlitePool, student_id: i64) -> Result<Vec<Subscription>> {
    let rows = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, student_id, external_subscription_id, billing_cycle_day, status,
               payment_failed, updated_at
        FROM subscriptions
        WHERE student_id = ?
        ORDER BY id DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
