//! User operations

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{NewUser, User};
use crate::repository::Database;

const USER_COLUMNS: &str = "id, user_uuid, email, name, password_hash, verified, is_active, is_admin, created_at, updated_at";

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user
    ///
    /// Email uniqueness is enforced by the unique index; a clash is reported
    /// as `DbError::Duplicate`.
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();
        let user_uuid = Uuid::new_v4().to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO users (user_uuid, email, name, password_hash, verified, is_active, is_admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user_uuid)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.verified)
        .bind(user.is_admin)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, format!("User '{}' already exists", user.email)))?;

        let id: i64 = result.get("id");

        Ok(User {
            id,
            user_uuid,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            verified: user.verified,
            is_active: true,
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by the public UUID used in verification links
    pub async fn get_user_by_uuid(&self, user_uuid: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_uuid = ?"))
            .bind(user_uuid)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Set the verification flag
    pub async fn set_user_verified(&self, id: i64, verified: bool) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verified = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(verified)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the active flag (false bans the account)
    pub async fn set_user_active(&self, id: i64, active: bool) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(active)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove an account from the directory
    ///
    /// Account removal belongs to the directory's owner, not the session
    /// layer, so no route calls this. The user's refresh records go with it
    /// through the foreign key cascade, and tokens already issued to the
    /// user stop resolving.
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
