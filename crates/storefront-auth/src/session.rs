//! Carrying session credentials over HTTP
//!
//! API clients send the access token in an `Authorization: Bearer` header
//! and receive token pairs in JSON bodies. Browsers carry both tokens in
//! HttpOnly cookies managed here.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use storefront_db::User;
use time::Duration;
use tracing::debug;

use crate::error::AuthError;
use crate::service::{AuthService, TokenPair};

/// Names and flags of the session cookies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CookieSettings {
    pub access_name: String,
    pub refresh_name: String,
    /// Mark cookies `Secure` (HTTPS only)
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            access_name: "token".to_string(),
            refresh_name: "refresh_token".to_string(),
            secure: false,
        }
    }
}

impl CookieSettings {
    fn build(&self, name: &str, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((name.to_string(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age)
            .build()
    }
}

/// Where a client keeps its session credentials
#[derive(Debug, Clone)]
pub enum SessionBridge {
    Bearer,
    Cookie(CookieSettings),
}

impl SessionBridge {
    /// Extract the access token presented with a request
    pub fn read_credential(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        match self {
            SessionBridge::Bearer => {
                let header = headers
                    .get(AUTHORIZATION)
                    .and_then(|h| h.to_str().ok())
                    .ok_or(AuthError::Unauthenticated)?;
                extract_bearer_token(header).map(str::to_string)
            }
            SessionBridge::Cookie(settings) => read_cookie(headers, &settings.access_name),
        }
    }

    /// Extract the refresh token a browser holds. Bearer clients send it in
    /// the request body instead.
    pub fn read_refresh_credential(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        match self {
            SessionBridge::Bearer => Err(AuthError::Unauthenticated),
            SessionBridge::Cookie(settings) => read_cookie(headers, &settings.refresh_name),
        }
    }

    /// Attach a freshly issued pair to the response
    pub fn write_credential(&self, jar: CookieJar, pair: &TokenPair) -> CookieJar {
        match self {
            SessionBridge::Bearer => jar,
            SessionBridge::Cookie(settings) => jar
                .add(settings.build(
                    &settings.access_name,
                    pair.access_token.clone(),
                    Duration::seconds(pair.expires_in_seconds),
                ))
                .add(settings.build(
                    &settings.refresh_name,
                    pair.refresh_token.clone(),
                    Duration::seconds(pair.refresh_expires_in_seconds),
                )),
        }
    }

    /// Drop the client's credentials by overwriting them with expired cookies
    pub fn clear_credential(&self, jar: CookieJar) -> CookieJar {
        match self {
            SessionBridge::Bearer => jar,
            SessionBridge::Cookie(settings) => jar
                .add(settings.build(&settings.access_name, String::new(), Duration::ZERO))
                .add(settings.build(&settings.refresh_name, String::new(), Duration::ZERO)),
        }
    }

    /// Resolve the user behind a request
    ///
    /// Bearer requests without a usable token fail. Cookie requests fall back
    /// to anonymous (`None`) unless the failure is internal.
    pub async fn current_user(
        &self,
        auth: &AuthService,
        headers: &HeaderMap,
    ) -> Result<Option<User>, AuthError> {
        let result = match self.read_credential(headers) {
            Ok(token) => auth.resolve_current_user(&token).await,
            Err(e) => Err(e),
        };

        match (self, result) {
            (_, Ok(user)) => Ok(Some(user)),
            (SessionBridge::Bearer, Err(e)) => Err(e),
            (SessionBridge::Cookie(_), Err(e)) if e.is_internal() => Err(e),
            (SessionBridge::Cookie(_), Err(e)) => {
                debug!("Treating cookie session as anonymous: {}", e);
                Ok(None)
            }
        }
    }
}

fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::Unauthenticated),
    }
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Result<String, AuthError> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::Unauthenticated)
}
