//! Ledger of billing-provider events already applied.

use sqlx::SqliteConnection;

use crate::Result;

/// Whether an event id has been recorded.
pub async fn is_processed(conn: &mut SqliteConnection, event_id: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM billing_events
        WHERE event_id = ?
        "#,
    )
    .bind(event_id)
    .fetch_optional(conn)
    .await?;

    Ok(found.is_some())
}

/// Record an event id. Returns false if it was already recorded.
pub async fn mark_processed(conn: &mut SqliteConnection, event_id: &str, event_type: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO billing_events (event_id, event_type)
        VALUES (?, ?)
        "#,
    )
    .bind(event_id)
    .bind(event_type)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
