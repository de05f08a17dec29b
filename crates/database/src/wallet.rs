//! Student wallets and the append-only transaction ledger.
//!
//! Every balance or trial-credit change writes exactly one
//! `wallet_transactions` row in the same statement sequence, so the
//! functions taking a connection must run inside a transaction. The
//! `apply_*` wrappers open one themselves.
//!
//! The cached `balance_cents` always equals the sum of the student's ledger
//! amounts. Trial-credit rows carry a zero amount.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Wallet, WalletTransaction};

/// Result of posting a ledger entry keyed by an idempotency reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posting {
    /// The mutation was applied and this row records it.
    Applied(WalletTransaction),
    /// A row with the same reference already existed; nothing changed.
    AlreadyApplied(WalletTransaction),
}

impl Posting {
    pub fn transaction(&self) -> &WalletTransaction {
        match self {
            Posting::Applied(tx) | Posting::AlreadyApplied(tx) => tx,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Posting::Applied(_))
    }
}

fn check_amount(amount_cents: i64) -> Result<()> {
    if amount_cents <= 0 {
        return Err(DatabaseError::Invalid {
            field: "amount_cents",
            reason: format!("must be positive, got {}", amount_cents),
        });
    }
    Ok(())
}

/// Create the wallet row if the student has none yet.
pub async fn ensure_wallet(conn: &mut SqliteConnection, student_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO wallets (student_id)
        VALUES (?)
        "#,
    )
    .bind(student_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Read a wallet on an open connection, creating it when missing.
pub async fn wallet_for(conn: &mut SqliteConnection, student_id: i64) -> Result<Wallet> {
    ensure_wallet(&mut *conn, student_id).await?;

    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
        SELECT student_id, balance_cents, trial_credits, trial_used, updated_at
        FROM wallets
        WHERE student_id = ?
        "#,
    )
    .bind(student_id)
    .fetch_one(conn)
    .await?;

    Ok(wallet)
}

/// Point-in-time wallet snapshot, `None` if the student never had one.
pub async fn get_wallet(pool: &SqlitePool, student_id: i64) -> Result<Option<Wallet>> {
    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
        SELECT student_id, balance_cents, trial_credits, trial_used, updated_at
        FROM wallets
        WHERE student_id = ?
        "#,
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(wallet)
}

/// Look up a ledger row by its idempotency reference.
pub async fn find_by_reference(
    conn: &mut SqliteConnection,
    reference: &str,
) -> Result<Option<WalletTransaction>> {
    let row = sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT id, student_id, amount_cents, reference, description, created_at
        FROM wallet_transactions
        WHERE reference = ?
        "#,
    )
    .bind(reference)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

async fn append(
    conn: &mut SqliteConnection,
    student_id: i64,
    amount_cents: i64,
    reference: &str,
    description: &str,
) -> Result<WalletTransaction> {
    sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions (student_id, amount_cents, reference, description)
        VALUES (?, ?, ?, ?)
        RETURNING id, student_id, amount_cents, reference, description, created_at
        "#,
    )
    .bind(student_id)
    .bind(amount_cents)
    .bind(reference)
    .bind(description)
    .fetch_one(conn)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "WalletTransaction", reference))
}

/// Take `amount_cents` from the wallet if the balance covers it.
///
/// The decrement is a single conditional update; when it matches no row the
/// current balance is read back for the error. Returns the negative ledger
/// row written by this call.
pub async fn debit(
    conn: &mut SqliteConnection,
    student_id: i64,
    amount_cents: i64,
    reference: &str,
    description: &str,
) -> Result<Posting> {
    check_amount(amount_cents)?;

    if let Some(existing) = find_by_reference(&mut *conn, reference).await? {
        return Ok(Posting::AlreadyApplied(existing));
    }

    ensure_wallet(&mut *conn, student_id).await?;

    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET balance_cents = balance_cents - ?,
            updated_at = datetime('now')
        WHERE student_id = ? AND balance_cents >= ?
        "#,
    )
    .bind(amount_cents)
    .bind(student_id)
    .bind(amount_cents)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let available_cents = wallet_for(&mut *conn, student_id).await?.balance_cents;
        return Err(DatabaseError::InsufficientBalance {
            required_cents: amount_cents,
            available_cents,
        });
    }

    let tx = append(conn, student_id, -amount_cents, reference, description).await?;
    Ok(Posting::Applied(tx))
}

/// Add `amount_cents` to the wallet unless `reference` was already posted.
pub async fn credit(
    conn: &mut SqliteConnection,
    student_id: i64,
    amount_cents: i64,
    reference: &str,
    description: &str,
) -> Result<Posting> {
    check_amount(amount_cents)?;

    if let Some(existing) = find_by_reference(&mut *conn, reference).await? {
        return Ok(Posting::AlreadyApplied(existing));
    }

    ensure_wallet(&mut *conn, student_id).await?;

    sqlx::query(
        r#"
        UPDATE wallets
        SET balance_cents = balance_cents + ?,
            updated_at = datetime('now')
        WHERE student_id = ?
        "#,
    )
    .bind(amount_cents)
    .bind(student_id)
    .execute(&mut *conn)
    .await?;

    let tx = append(conn, student_id, amount_cents, reference, description).await?;
    Ok(Posting::Applied(tx))
}

/// Use the student's one trial credit.
///
/// Succeeds only while a credit is left and no trial was used before; the
/// guard lives in the `UPDATE` so two concurrent trial bookings cannot both
/// win. Returns `None` when the student is not trial-eligible.
pub async fn consume_trial_credit(
    conn: &mut SqliteConnection,
    student_id: i64,
    reference: &str,
) -> Result<Option<WalletTransaction>> {
    ensure_wallet(&mut *conn, student_id).await?;

    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET trial_credits = trial_credits - 1,
            trial_used = 1,
            updated_at = datetime('now')
        WHERE student_id = ? AND trial_credits >= 1 AND trial_used = 0
        "#,
    )
    .bind(student_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let tx = append(conn, student_id, 0, reference, "trial credit used").await?;
    Ok(Some(tx))
}

/// Give a trial credit back, once per `reference`.
pub async fn restore_trial_credit(
    conn: &mut SqliteConnection,
    student_id: i64,
    reference: &str,
) -> Result<Posting> {
    if let Some(existing) = find_by_reference(&mut *conn, reference).await? {
        return Ok(Posting::AlreadyApplied(existing));
    }

    ensure_wallet(&mut *conn, student_id).await?;

    sqlx::query(
        r#"
        UPDATE wallets
        SET trial_credits = trial_credits + 1,
            trial_used = 0,
            updated_at = datetime('now')
        WHERE student_id = ?
        "#,
    )
    .bind(student_id)
    .execute(&mut *conn)
    .await?;

    let tx = append(conn, student_id, 0, reference, "trial credit restored").await?;
    Ok(Posting::Applied(tx))
}

/// Debit in a transaction of its own.
pub async fn apply_debit(
    pool: &SqlitePool,
    student_id: i64,
    amount_cents: i64,
    reference: &str,
    description: &str,
) -> Result<Posting> {
    let mut tx = pool.begin().await?;
    let posting = debit(&mut tx, student_id, amount_cents, reference, description).await?;
    tx.commit().await?;
    Ok(posting)
}

/// Credit in a transaction of its own.
pub async fn apply_credit(
    pool: &SqlitePool,
    student_id: i64,
    amount_cents: i64,
    reference: &str,
    description: &str,
) -> Result<Posting> {
    let mut tx = pool.begin().await?;
    let posting = credit(&mut tx, student_id, amount_cents, reference, description).await?;
    tx.commit().await?;
    Ok(posting)
}

/// Get a ledger row by ID.
pub async fn get_transaction(pool: &SqlitePool, id: i64) -> Result<WalletTransaction> {
    sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT id, student_id, amount_cents, reference, description, created_at
        FROM wallet_transactions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "WalletTransaction",
        id: id.to_string(),
    })
}

/// Most recent ledger rows of a student.
pub async fn list_transactions(
    pool: &SqlitePool,
    student_id: i64,
    limit: i64,
) -> Result<Vec<WalletTransaction>> {
    let rows = sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT id, student_id, amount_cents, reference, description, created_at
        FROM wallet_transactions
        WHERE student_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(student_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Balance recomputed as the sum of the ledger.
pub async fn ledger_balance(pool: &SqlitePool, student_id: i64) -> Result<i64> {
    let sum = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0)
        FROM wallet_transactions
        WHERE student_id = ?
        "#,
    )
    .bind(student_id)
    .fetch_one(pool)
    .await?;

    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, Role};
    use crate::{user, Database};

    async fn setup() -> (Database, i64) {
        let db = Database::in_memory().await.unwrap();
        let student = user::create_user(
            db.pool(),
            &NewUser {
                name: "Student".to_string(),
                email: "student@example.com".to_string(),
                role: Role::Student,
                hourly_rate_cents: None,
            },
        )
        .await
        .unwrap();
        (db, student.id)
    }

    async fn balance(db: &Database, student_id: i64) -> i64 {
        get_wallet(db.pool(), student_id)
            .await
            .unwrap()
            .map(|w| w.balance_cents)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let (db, student_id) = setup().await;

        let posting = apply_credit(db.pool(), student_id, 10_000, "checkout:cs_1", "top up")
            .await
            .unwrap();
        assert!(posting.was_applied());
        assert_eq!(balance(&db, student_id).await, 10_000);

        let posting = apply_debit(db.pool(), student_id, 5_000, "lesson:1", "lesson")
            .await
            .unwrap();
        assert_eq!(posting.transaction().amount_cents, -5_000);
        assert_eq!(balance(&db, student_id).await, 5_000);
        assert_eq!(ledger_balance(db.pool(), student_id).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn test_overdraft_rejected_and_balance_unchanged() {
        let (db, student_id) = setup().await;
        apply_credit(db.pool(), student_id, 1_000, "checkout:cs_1", "top up")
            .await
            .unwrap();

        let result = apply_debit(db.pool(), student_id, 5_000, "lesson:1", "lesson").await;
        match result {
            Err(DatabaseError::InsufficientBalance {
                required_cents,
                available_cents,
            }) => {
                assert_eq!(required_cents, 5_000);
                assert_eq!(available_cents, 1_000);
            }
            other => panic!("expected insufficient balance, got {:?}", other),
        }

        assert_eq!(balance(&db, student_id).await, 1_000);
        assert_eq!(list_transactions(db.pool(), student_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exact_balance_debit_succeeds() {
        let (db, student_id) = setup().await;
        apply_credit(db.pool(), student_id, 5_000, "checkout:cs_1", "top up")
            .await
            .unwrap();

        apply_debit(db.pool(), student_id, 5_000, "lesson:1", "lesson")
            .await
            .unwrap();
        assert_eq!(balance(&db, student_id).await, 0);
    }

    #[tokio::test]
    async fn test_credit_replay_is_noop() {
        let (db, student_id) = setup().await;

        let first = apply_credit(db.pool(), student_id, 2_500, "invoice:in_1", "renewal")
            .await
            .unwrap();
        let second = apply_credit(db.pool(), student_id, 2_500, "invoice:in_1", "renewal")
            .await
            .unwrap();

        assert!(first.was_applied());
        assert!(!second.was_applied());
        assert_eq!(first.transaction(), second.transaction());
        assert_eq!(balance(&db, student_id).await, 2_500);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let (db, student_id) = setup().await;

        assert!(matches!(
            apply_credit(db.pool(), student_id, 0, "x", "zero").await,
            Err(DatabaseError::Invalid { .. })
        ));
        assert!(matches!(
            apply_debit(db.pool(), student_id, -5, "y", "negative").await,
            Err(DatabaseError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_trial_credit_used_once() {
        let (db, student_id) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let wallet = wallet_for(&mut conn, student_id).await.unwrap();
        assert_eq!(wallet.trial_credits, 1);

        let used = consume_trial_credit(&mut conn, student_id, "trial:1").await.unwrap();
        assert_eq!(used.map(|t| t.amount_cents), Some(0));
        assert!(consume_trial_credit(&mut conn, student_id, "trial:2")
            .await
            .unwrap()
            .is_none());

        let wallet = wallet_for(&mut conn, student_id).await.unwrap();
        assert_eq!(wallet.trial_credits, 0);
        assert!(wallet.trial_used);

        let restored = restore_trial_credit(&mut conn, student_id, "trial-refund:1")
            .await
            .unwrap();
        assert!(restored.was_applied());
        let again = restore_trial_credit(&mut conn, student_id, "trial-refund:1")
            .await
            .unwrap();
        assert!(!again.was_applied());

        let wallet = wallet_for(&mut conn, student_id).await.unwrap();
        assert_eq!(wallet.trial_credits, 1);
        assert!(!wallet.trial_used);
    }
}
