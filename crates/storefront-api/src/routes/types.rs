//! Request/Response DTOs

use serde::{Deserialize, Serialize};
use storefront_db::User;

// ==================== Auth Types ====================

/// Login request, accepted as JSON or as a browser form
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "login")]
    pub username: String,
    pub password: String,
}

/// Refresh or logout request from an API client
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// ==================== User Types ====================

/// Registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

/// Ban/unban request
#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// User response (without password)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub user_uuid: String,
    pub email: String,
    pub name: String,
    pub verified: bool,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            user_uuid: u.user_uuid,
            email: u.email,
            name: u.name,
            verified: u.verified,
            is_active: u.is_active,
            is_admin: u.is_admin,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

/// Verification result
#[derive(Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub email: String,
}

/// Browser session view; `user` is null for anonymous visitors
#[derive(Serialize)]
pub struct SessionView {
    pub user: Option<UserResponse>,
}
