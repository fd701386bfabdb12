//! Account registration, verification and admin control

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use storefront_db::{NewUser, User};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::{MAX_PASSWORD_LENGTH, RequireAdmin};
use super::types::{RegisterRequest, SetActiveRequest, UserResponse, VerifyResponse};

// ==================== Input Validation ====================

/// Maximum allowed email length
const MAX_EMAIL_LENGTH: usize = 254;
const MIN_NAME_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 50;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;

fn validate_email(email: &str) -> Result<(), ApiError> {
    if !email.contains('@') {
        return Err(ApiError::BadRequest("Email address is not valid".to_string()));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Email exceeds maximum length of {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "Name must be between {} and {} characters long",
            MIN_NAME_LENGTH, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Validate password length and confirmation
fn validate_password(password: &str, confirm: Option<&str>) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    if confirm.is_some_and(|c| c != password) {
        return Err(ApiError::BadRequest("Passwords do not match".to_string()));
    }
    Ok(())
}

// ==================== User Routes ====================

/// Validate a registration, store the unverified account and send its
/// verification link. Shared by the JSON and browser signup routes.
pub(crate) async fn create_account(
    state: &AppState,
    request: RegisterRequest,
) -> Result<User, ApiError> {
    let email = request.email.trim();
    let name = request.name.trim();
    validate_email(email)?;
    validate_name(name)?;
    validate_password(&request.password, request.password_confirm.as_deref())?;

    debug!("Registering user: {}", email);

    let password_hash = state.auth.hash_password(&request.password).await?;
    let user = state
        .db
        .insert_user(NewUser {
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            verified: false,
            is_admin: false,
        })
        .await?;

    info!("Registered user: {}", user.email);

    let link = state.verification_link(&user.user_uuid);
    if let Err(e) = state.notifier.send_verification(&user, &link).await {
        warn!("Failed to send verification link to {}: {}", user.email, e);
    }

    Ok(user)
}

/// POST /api/user/create
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = create_account(&state, request).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/user/verify/{uuid}
async fn verify(
    State(state): State<AppState>,
    Path(user_uuid): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_uuid(&user_uuid)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid verification link".to_string()))?;

    if !user.verified {
        state.auth.verify_account(user.id).await?;
        info!("Verified user: {}", user.email);
    }

    Ok(Json(VerifyResponse {
        verified: true,
        email: user.email,
    }))
}

/// PUT /api/user/{id}/active (Admin only)
async fn set_active(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if id == admin.id && !request.active {
        return Err(ApiError::BadRequest("Cannot ban your own account".to_string()));
    }

    if !state.auth.set_account_active(id, request.active).await? {
        return Err(ApiError::NotFound(format!("User: {}", id)));
    }

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    info!(
        "Admin {} set user {} active={}",
        admin.email, user.email, request.active
    );

    Ok(Json(user.into()))
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/user/create", post(register))
        .route("/api/user/verify/{uuid}", get(verify))
        .route("/api/user/{id}/active", put(set_active))
}
