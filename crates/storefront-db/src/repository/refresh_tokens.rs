//! Refresh token operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewRefreshToken, RefreshTokenRecord};

use super::Database;

impl Database {
    /// Insert a refresh token record
    ///
    /// Keys are unique; a collision is reported as `DbError::Duplicate`.
    pub async fn insert_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, refresh_key, expires_at, created_at, consumed_at)
            VALUES (?, ?, ?, ?, NULL)
            RETURNING id
            "#,
        )
        .bind(token.user_id)
        .bind(&token.refresh_key)
        .bind(token.expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "Refresh token key already exists"))?;

        Ok(RefreshTokenRecord {
            id: result.get("id"),
            user_id: token.user_id,
            refresh_key: token.refresh_key,
            expires_at: token.expires_at,
            created_at: now,
            consumed_at: None,
        })
    }

    /// Get a refresh token record by its opaque key
    pub async fn get_refresh_token_by_key(
        &self,
        refresh_key: &str,
    ) -> Result<Option<RefreshTokenRecord>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, user_id, refresh_key, expires_at, created_at, consumed_at
            FROM refresh_tokens
            WHERE refresh_key = ?
            "#,
        )
        .bind(refresh_key)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| RefreshTokenRecord::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Mark a refresh token record consumed
    ///
    /// The update only matches a record that has not been consumed yet, so
    /// of several concurrent callers exactly one observes `true`. The expiry
    /// is pulled forward to the consumption time.
    pub async fn consume_refresh_token(&self, id: i64) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET consumed_at = ?,
                expires_at = CASE WHEN julianday(expires_at) > julianday(?) THEN ? ELSE expires_at END
            WHERE id = ? AND consumed_at IS NULL
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Consume every unconsumed refresh token of a user, returning the count
    pub async fn consume_user_refresh_tokens(&self, user_id: i64) -> Result<u64, DbError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET consumed_at = ?,
                expires_at = CASE WHEN julianday(expires_at) > julianday(?) THEN ? ELSE expires_at END
            WHERE user_id = ? AND consumed_at IS NULL
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
