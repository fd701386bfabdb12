//! Auth service configuration

use chrono::Duration;
use std::fmt;

use crate::jwt::SigningAlgorithm;
use crate::password::HasherConfig;

/// Access token lifetime used when none is configured: 5 minutes
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 5;
/// Refresh token lifetime used when none is configured: one day
pub const DEFAULT_REFRESH_TTL_MINUTES: i64 = 60 * 24;

/// Settings injected into the auth service at construction
///
/// Read-only once the service is built; every request shares the same
/// secret, algorithm and lifetimes.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub algorithm: SigningAlgorithm,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub hasher: HasherConfig,
}

impl AuthConfig {
    /// Config with default algorithm, lifetimes and work factor
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: SigningAlgorithm::default(),
            access_ttl: Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::minutes(DEFAULT_REFRESH_TTL_MINUTES),
            hasher: HasherConfig::default(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("hasher", &self.hasher)
            .finish()
    }
}
