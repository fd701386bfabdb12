//! Authentication extractors and JSON API routes

use axum::{
    Json, Router,
    extract::{FromRef, FromRequestParts, State},
    http::{StatusCode, request::Parts},
    routing::{get, post},
};
use storefront_auth::{AuthError, TokenPair};
use storefront_db::User;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{LoginRequest, RefreshRequest, UserResponse};

/// Maximum allowed password length (prevent DoS with very large passwords)
pub(crate) const MAX_PASSWORD_LENGTH: usize = 256;

// ==================== Auth Extractors ====================

/// Extractor for the user behind a bearer access token (required)
pub struct RequireUser(pub User);

impl<S> FromRequestParts<S> for RequireUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let user = app_state
            .bearer
            .current_user(&app_state.auth, &parts.headers)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        debug!("Authenticated user: {} ({})", user.email, user.id);
        Ok(RequireUser(user))
    }
}

/// Extractor for an admin user (required)
pub struct RequireAdmin(pub User);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin {
            return Err(AuthError::InsufficientPermissions.into());
        }

        Ok(RequireAdmin(user))
    }
}

// ==================== Metrics ====================

pub(crate) fn record_login(result: &Result<TokenPair, AuthError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };
    metrics::counter!("storefront_logins_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_refresh(result: &Result<TokenPair, AuthError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };
    metrics::counter!("storefront_token_refresh_total", "outcome" => outcome).increment(1);
}

// ==================== Auth Routes ====================

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }

    let result = state.auth.login(&request.username, &request.password).await;
    record_login(&result);
    Ok(Json(result?))
}

/// POST /api/auth/refresh
async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let result = state.auth.refresh(&request.refresh_token).await;
    record_refresh(&result);
    Ok(Json(result?))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(&request.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
async fn me(RequireUser(user): RequireUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}
