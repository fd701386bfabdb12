//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use storefront_db::DbError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Account is not verified")]
    AccountNotVerified,

    #[error("Account is banned")]
    AccountBanned,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown user")]
    UnknownUser,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Storage error: {0}")]
    Storage(DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(msg) => AuthError::Conflict(msg),
            other => AuthError::Storage(other),
        }
    }
}

impl AuthError {
    /// Stable machine-readable code reported to API clients
    pub fn code(&self) -> &'static str {
        match self {
            // Existence of an account is never revealed
            AuthError::InvalidCredentials | AuthError::UserNotFound => "INVALID_CREDENTIALS",
            AuthError::AccountNotVerified => "ACCOUNT_NOT_VERIFIED",
            AuthError::AccountBanned => "ACCOUNT_BANNED",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::UnknownUser => "UNKNOWN_USER",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::InsufficientPermissions => "FORBIDDEN",
            AuthError::MalformedHash
            | AuthError::PasswordHash(_)
            | AuthError::Storage(_)
            | AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::UserNotFound
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::UnknownUser
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::AccountNotVerified
            | AuthError::AccountBanned
            | AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::MalformedHash
            | AuthError::PasswordHash(_)
            | AuthError::Storage(_)
            | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; internal detail stays in the logs
    pub fn public_message(&self) -> String {
        match self {
            AuthError::UserNotFound => AuthError::InvalidCredentials.to_string(),
            AuthError::MalformedHash
            | AuthError::PasswordHash(_)
            | AuthError::Storage(_)
            | AuthError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// True for failures of the infrastructure rather than of the credential
    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!("Authentication failure: {}", self);
        }

        let body = axum::Json(json!({
            "error": {
                "code": self.code(),
                "message": self.public_message(),
            }
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_not_found_does_not_leak_existence() {
        assert_eq!(AuthError::UserNotFound.code(), AuthError::InvalidCredentials.code());
        assert_eq!(
            AuthError::UserNotFound.public_message(),
            AuthError::InvalidCredentials.public_message()
        );
        assert_eq!(AuthError::UserNotFound.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = AuthError::PasswordHash("argon2 exploded".to_string());
        assert!(err.is_internal());
        assert_eq!(err.public_message(), "Internal error");
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err = AuthError::from(DbError::Duplicate("key".to_string()));
        assert!(matches!(err, AuthError::Conflict(_)));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_account_state_errors_are_forbidden() {
        assert_eq!(AuthError::AccountNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::AccountBanned.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::AccountBanned.code(), "ACCOUNT_BANNED");
    }
}
