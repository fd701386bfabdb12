//! Storefront authentication
//!
//! Password hashing, signed expiring tokens, refresh token rotation and the
//! HTTP session plumbing shared by the API and browser routes.

pub mod config;
pub mod error;
pub mod jwt;
pub mod password;
pub mod service;
pub mod session;
pub mod store;

pub use config::AuthConfig;
pub use error::AuthError;
pub use jwt::{AccessClaims, Claims, RefreshClaims, SigningAlgorithm, TokenCodec, TokenKind};
pub use password::{CredentialHasher, HasherConfig};
pub use service::{AuthService, TokenPair};
pub use session::{CookieSettings, SessionBridge};
pub use store::{RefreshTokenStore, UserDirectory};
