//! Browser session routes
//!
//! Same flows as the JSON API, with the tokens carried in cookies. Any
//! credential failure sends the browser back to `/login` with its session
//! cookies cleared; only internal failures produce an error response.
//! Signup failures go back to `/signup`, and a new account is sent to
//! `/login` since it cannot sign in until verified.

use axum::{
    Form, Json, Router,
    extract::{State, rejection::FormRejection},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use storefront_auth::{AuthError, TokenPair};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::{MAX_PASSWORD_LENGTH, record_login, record_refresh};
use super::types::{LoginRequest, RegisterRequest, SessionView};
use super::users::create_account;

/// GET /, GET /login and GET /signup
async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, ApiError> {
    let user = state.browser.current_user(&state.auth, &headers).await?;
    Ok(Json(SessionView {
        user: user.map(Into::into),
    }))
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    form: Result<Form<LoginRequest>, FormRejection>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let form = match form {
        Ok(Form(form)) => form,
        Err(e) => {
            debug!("Malformed login form: {}", e);
            return Ok(signed_out(&state, jar));
        }
    };
    if form.password.len() > MAX_PASSWORD_LENGTH {
        return Ok(signed_out(&state, jar));
    }

    let result = state.auth.login(&form.username, &form.password).await;
    record_login(&result);
    establish(&state, jar, result)
}

/// POST /signup
async fn signup(
    State(state): State<AppState>,
    form: Result<Form<RegisterRequest>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let Ok(Form(request)) = form else {
        return Ok(Redirect::to("/signup"));
    };

    match create_account(&state, request).await {
        Ok(_) => Ok(Redirect::to("/login")),
        Err(e) if e.is_internal() => Err(e),
        Err(e) => {
            debug!("Browser signup rejected: {}", e);
            Ok(Redirect::to("/signup"))
        }
    }
}

/// POST /refresh
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Redirect), ApiError> {
    let token = match state.browser.read_refresh_credential(&headers) {
        Ok(token) => token,
        Err(_) => return Ok(signed_out(&state, jar)),
    };

    let result = state.auth.refresh(&token).await;
    record_refresh(&result);
    establish(&state, jar, result)
}

/// GET /logout
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Redirect), ApiError> {
    if let Ok(token) = state.browser.read_refresh_credential(&headers) {
        state.auth.logout(&token).await?;
    }
    Ok(signed_out(&state, jar))
}

fn establish(
    state: &AppState,
    jar: CookieJar,
    result: Result<TokenPair, AuthError>,
) -> Result<(CookieJar, Redirect), ApiError> {
    match result {
        Ok(pair) => Ok((state.browser.write_credential(jar, &pair), Redirect::to("/"))),
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => {
            debug!("Browser session rejected: {}", e);
            Ok(signed_out(state, jar))
        }
    }
}

fn signed_out(state: &AppState, jar: CookieJar) -> (CookieJar, Redirect) {
    (state.browser.clear_credential(jar), Redirect::to("/login"))
}

/// Create browser routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(session))
        .route("/login", get(session).post(login))
        .route("/signup", get(session).post(signup))
        .route("/refresh", post(refresh))
        .route("/logout", get(logout))
}
