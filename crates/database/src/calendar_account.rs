//! Calendar OAuth credentials and anti-forgery states.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::CalendarAccount;
use crate::Result;

/// Store fresh tokens for a user, marking the account connected.
pub async fn save_tokens(
    pool: &SqlitePool,
    user_id: i64,
    access_token: &str,
    refresh_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<CalendarAccount> {
    let account = sqlx::query_as::<_, CalendarAccount>(
        r#"
        INSERT INTO calendar_accounts (user_id, access_token, refresh_token, expires_at, status)
        VALUES (?, ?, ?, ?, 'connected')
        ON CONFLICT(user_id) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            expires_at = excluded.expires_at,
            status = 'connected',
            updated_at = datetime('now')
        RETURNING user_id, access_token, refresh_token, expires_at, status, updated_at
        "#,
    )
    .bind(user_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(account)
}

/// Replace the access token after a refresh.
///
/// Providers may rotate the refresh token; `None` keeps the stored one.
pub async fn update_access_token(
    pool: &SqlitePool,
    user_id: i64,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE calendar_accounts
        SET access_token = ?,
            refresh_token = COALESCE(?, refresh_token),
            expires_at = ?,
            status = 'connected',
            updated_at = datetime('now')
        WHERE user_id = ?
        "#,
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the calendar account of a user, if one was ever connected.
pub async fn get_account(pool: &SqlitePool, user_id: i64) -> Result<Option<CalendarAccount>> {
    let account = sqlx::query_as::<_, CalendarAccount>(
        r#"
        SELECT user_id, access_token, refresh_token, expires_at, status, updated_at
        FROM calendar_accounts
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Mark an account revoked; it stays unusable until re-authorized.
pub async fn mark_revoked(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE calendar_accounts
        SET status = 'revoked',
            updated_at = datetime('now')
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove stored credentials. Returns true if an account existed.
pub async fn disconnect(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM calendar_accounts
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remember an OAuth state token issued to a user.
pub async fn create_oauth_state(pool: &SqlitePool, state: &str, user_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO oauth_states (state, user_id)
        VALUES (?, ?)
        "#,
    )
    .bind(state)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Consume an OAuth state token issued within `max_age`.
///
/// Returns the user it was issued to. A token can be taken once.
pub async fn take_oauth_state(pool: &SqlitePool, state: &str, max_age: Duration) -> Result<Option<i64>> {
    let modifier = format!("-{} seconds", max_age.as_secs());
    let user_id = sqlx::query_scalar::<_, i64>(
        r#"
        DELETE FROM oauth_states
        WHERE state = ? AND created_at >= datetime('now', ?)
        RETURNING user_id
        "#,
    )
    .bind(state)
    .bind(modifier)
    .fetch_optional(pool)
    .await?;

    Ok(user_id)
}

/// Prune OAuth states older than the specified TTL.
pub async fn prune_oauth_states(pool: &SqlitePool, ttl: Duration) -> Result<u64> {
    let modifier = format!("-{} seconds", ttl.as_secs());
    let result = sqlx::query(
        r#"
        DELETE FROM oauth_states
        WHERE created_at < datetime('now', ?)
        "#,
    )
    .bind(modifier)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
