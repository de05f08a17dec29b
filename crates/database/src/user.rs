//! User operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{NewUser, Role, User};

/// Register a user and return the stored record.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    if user.name.trim().is_empty() {
        return Err(DatabaseError::Invalid {
            field: "name",
            reason: "cannot be empty".to_string(),
        });
    }
    if let Some(rate) = user.hourly_rate_cents {
        if rate < 0 {
            return Err(DatabaseError::Invalid {
                field: "hourly_rate_cents",
                reason: "cannot be negative".to_string(),
            });
        }
    }

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, role, hourly_rate_cents)
        VALUES (?, ?, ?, ?)
        RETURNING id, name, email, role, hourly_rate_cents, created_at
        "#,
    )
    .bind(user.name.trim())
    .bind(user.email.trim())
    .bind(user.role)
    .bind(user.hourly_rate_cents)
    .fetch_one(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "User", user.email.clone()))
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, role, hourly_rate_cents, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Get a user by ID, requiring the teacher role.
pub async fn get_teacher(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, role, hourly_rate_cents, created_at
        FROM users
        WHERE id = ? AND role = 'teacher'
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Teacher",
        id: id.to_string(),
    })
}

/// Set or clear a teacher's hourly rate.
pub async fn set_hourly_rate(pool: &SqlitePool, teacher_id: i64, rate_cents: Option<i64>) -> Result<()> {
    if matches!(rate_cents, Some(rate) if rate < 0) {
        return Err(DatabaseError::Invalid {
            field: "hourly_rate_cents",
            reason: "cannot be negative".to_string(),
        });
    }

    let result = sqlx::query(
        r#"
        UPDATE users
        SET hourly_rate_cents = ?
        WHERE id = ? AND role = 'teacher'
        "#,
    )
    .bind(rate_cents)
    .bind(teacher_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Teacher",
            id: teacher_id.to_string(),
        });
    }

    Ok(())
}

/// List users holding a role, ordered by name.
pub async fn list_by_role(pool: &SqlitePool, role: Role) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, role, hourly_rate_cents, created_at
        FROM users
        WHERE role = ?
        ORDER BY name
        "#,
    )
    .bind(role)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn new_user(name: &str, email: &str, role: Role) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role,
            hourly_rate_cents: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::in_memory().await.unwrap();

        let user = create_user(db.pool(), &new_user("Alice", "alice@example.com", Role::Student))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Student);

        let fetched = get_user(db.pool(), user.id).await.unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = Database::in_memory().await.unwrap();
        create_user(db.pool(), &new_user("A", "dup@example.com", Role::Student))
            .await
            .unwrap();

        let result = create_user(db.pool(), &new_user("B", "dup@example.com", Role::Teacher)).await;
        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_get_teacher_requires_role() {
        let db = Database::in_memory().await.unwrap();
        let student = create_user(db.pool(), &new_user("S", "s@example.com", Role::Student))
            .await
            .unwrap();
        let teacher = create_user(db.pool(), &new_user("T", "t@example.com", Role::Teacher))
            .await
            .unwrap();

        assert!(get_teacher(db.pool(), teacher.id).await.is_ok());
        assert!(matches!(
            get_teacher(db.pool(), student.id).await,
            Err(DatabaseError::NotFound { entity: "Teacher", .. })
        ));
    }

    #[tokio::test]
    async fn test_set_hourly_rate() {
        let db = Database::in_memory().await.unwrap();
        let teacher = create_user(db.pool(), &new_user("T", "t@example.com", Role::Teacher))
            .await
            .unwrap();

        set_hourly_rate(db.pool(), teacher.id, Some(5000)).await.unwrap();
        assert_eq!(
            get_teacher(db.pool(), teacher.id).await.unwrap().hourly_rate_cents,
            Some(5000)
        );

        assert!(matches!(
            set_hourly_rate(db.pool(), teacher.id, Some(-1)).await,
            Err(DatabaseError::Invalid { .. })
        ));

        let teachers = list_by_role(db.pool(), Role::Teacher).await.unwrap();
        assert_eq!(teachers.len(), 1);
    }
}
