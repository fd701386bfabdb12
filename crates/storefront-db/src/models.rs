//! Database models

use crate::utils::{parse_datetime_or_now, parse_optional_datetime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Public identifier used in verification links
    pub user_uuid: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub verified: bool,
    /// False when the account is banned
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user (for insertion)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub verified: bool,
    pub is_admin: bool,
}

/// Lifecycle state of a refresh token record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefreshTokenState {
    Active,
    Consumed,
    Expired,
}

impl RefreshTokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTokenState::Active => "active",
            RefreshTokenState::Consumed => "consumed",
            RefreshTokenState::Expired => "expired",
        }
    }
}

/// Server-side record of an issued refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    /// Opaque random key embedded in the refresh token claims
    #[serde(skip_serializing)]
    pub refresh_key: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set once the token has been rotated or logged out
    pub consumed_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// State of the record at `now`. Consumption wins over expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.consumed_at.is_some() {
            RefreshTokenState::Consumed
        } else if self.expires_at <= now {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state_at(Utc::now()) == RefreshTokenState::Active
    }
}

/// New refresh token record (for insertion)
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub refresh_key: String,
    pub expires_at: DateTime<Utc>,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.try_get("id")?,
            user_uuid: row.try_get("user_uuid")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            verified: row.try_get("verified")?,
            is_active: row.try_get("is_active")?,
            is_admin: row.try_get("is_admin")?,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for RefreshTokenRecord {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(RefreshTokenRecord {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            refresh_key: row.try_get("refresh_key")?,
            expires_at: parse_datetime_or_now(&row.try_get::<String, _>("expires_at")?),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            consumed_at: parse_optional_datetime(row.try_get("consumed_at")?),
        })
    }
}
