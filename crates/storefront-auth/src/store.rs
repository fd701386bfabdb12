//! Collaborator interfaces consumed by the auth service
//!
//! The service never talks to SQL directly: users come from a
//! [`UserDirectory`] and refresh token records live in a
//! [`RefreshTokenStore`]. Both are implemented for the SQLite [`Database`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storefront_db::{Database, NewRefreshToken, RefreshTokenRecord, User};

use crate::error::AuthError;

/// User account lookup and flag mutation
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError>;

    /// Returns false when no such user exists
    async fn set_verified(&self, id: i64, verified: bool) -> Result<bool, AuthError>;

    /// Returns false when no such user exists
    async fn set_active(&self, id: i64, active: bool) -> Result<bool, AuthError>;
}

/// Persistence of refresh token records
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Fails with `Conflict` when the key is already taken
    async fn create(
        &self,
        user_id: i64,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AuthError>;

    async fn find_by_key(&self, key: &str) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Consume the record. Returns true only for the call that performed the
    /// transition; revoking an already consumed record is a no-op.
    async fn revoke(&self, record: &RefreshTokenRecord) -> Result<bool, AuthError>;

    /// Consume every unconsumed record of a user
    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AuthError>;
}

#[async_trait]
impl UserDirectory for Database {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.get_user_by_email(email).await?)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        Ok(self.get_user_by_id(id).await?)
    }

    async fn set_verified(&self, id: i64, verified: bool) -> Result<bool, AuthError> {
        Ok(self.set_user_verified(id, verified).await?)
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<bool, AuthError> {
        Ok(self.set_user_active(id, active).await?)
    }
}

#[async_trait]
impl RefreshTokenStore for Database {
    async fn create(
        &self,
        user_id: i64,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AuthError> {
        Ok(self
            .insert_refresh_token(NewRefreshToken {
                user_id,
                refresh_key: key.to_string(),
                expires_at,
            })
            .await?)
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.get_refresh_token_by_key(key).await?)
    }

    async fn revoke(&self, record: &RefreshTokenRecord) -> Result<bool, AuthError> {
        Ok(self.consume_refresh_token(record.id).await?)
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AuthError> {
        Ok(self.consume_user_refresh_tokens(user_id).await?)
    }
}
