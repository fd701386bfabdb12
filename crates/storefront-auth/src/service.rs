//! Authentication service
//!
//! Owns the session state machine. A refresh token key is `Active` until it
//! is either consumed (rotation or logout) or its lifetime elapses; both are
//! terminal. Rotation consumes the presented key before a replacement is
//! issued, so a failure half way leaves the old key unusable.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use storefront_db::{RefreshTokenState, User};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::jwt::{AccessClaims, RefreshClaims, TokenCodec, TokenKind};
use crate::password::CredentialHasher;
use crate::store::{RefreshTokenStore, UserDirectory};

/// Freshly issued access/refresh token pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime
    pub expires_in_seconds: i64,
    #[serde(skip)]
    pub refresh_expires_in_seconds: i64,
}

/// Login, rotation and identity resolution over injected collaborators
pub struct AuthService {
    codec: TokenCodec,
    hasher: CredentialHasher,
    /// Verified in place of a real hash when the account does not exist, so
    /// an unknown email costs as much as a wrong password. Built with the
    /// configured work factor.
    dummy_hash: String,
    users: Arc<dyn UserDirectory>,
    tokens: Arc<dyn RefreshTokenStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserDirectory>,
        tokens: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self, AuthError> {
        if config.access_ttl <= Duration::zero() || config.refresh_ttl <= Duration::zero() {
            return Err(AuthError::Internal("token lifetimes must be positive".to_string()));
        }

        let hasher = CredentialHasher::new(config.hasher)?;
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            codec: TokenCodec::new(&config.secret, config.algorithm),
            hasher,
            dummy_hash,
            users,
            tokens,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Authenticate with email and password and open a new session
    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, AuthError> {
        debug!("Login attempt for user: {}", identifier);

        let Some(user) = self.users.find_user_by_email(identifier).await? else {
            let _ = self.verify_password(password, &self.dummy_hash).await;
            return Err(AuthError::UserNotFound);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.verified {
            return Err(AuthError::AccountNotVerified);
        }
        if !user.is_active {
            return Err(AuthError::AccountBanned);
        }

        let pair = self.issue_pair(&user).await?;
        info!("User {} logged in successfully", user.email);
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, consuming the old one
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.codec.decode::<RefreshClaims>(refresh_token)?.data;
        if claims.typ != TokenKind::Refresh {
            return Err(AuthError::TokenInvalid);
        }

        let record = self
            .tokens
            .find_by_key(&claims.key)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if record.user_id.to_string() != claims.sub {
            warn!("Refresh token key does not belong to subject {}", claims.sub);
            return Err(AuthError::TokenInvalid);
        }

        let state = record.state_at(Utc::now());
        let consumed = self.tokens.revoke(&record).await?;
        if !consumed || state != RefreshTokenState::Active {
            warn!(
                "Rejected refresh for user {}: token already {}",
                record.user_id,
                if consumed { state.as_str() } else { "consumed" }
            );
            return Err(AuthError::TokenInvalid);
        }

        let user = self
            .users
            .find_user_by_id(record.user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;
        if !user.is_active {
            return Err(AuthError::AccountBanned);
        }

        let pair = self.issue_pair(&user).await?;
        debug!("Rotated refresh token for user {}", user.id);
        Ok(pair)
    }

    /// Resolve the user behind an access token
    ///
    /// The directory is consulted on every call; a valid token for a user
    /// that no longer exists is `UnknownUser`.
    pub async fn resolve_current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self.codec.decode::<AccessClaims>(access_token)?.data;
        if claims.typ != TokenKind::Access {
            return Err(AuthError::TokenInvalid);
        }

        let user_id: i64 = claims.sub.parse().map_err(|_| AuthError::TokenInvalid)?;
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UnknownUser)
    }

    /// End the session behind a refresh token
    ///
    /// Tokens that are expired, forged or already consumed are ignored.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = match self.codec.decode::<RefreshClaims>(refresh_token) {
            Ok(claims) => claims.data,
            Err(e) if e.is_internal() => return Err(e),
            Err(e) => {
                debug!("Ignoring logout with unusable refresh token: {}", e);
                return Ok(());
            }
        };

        let Some(record) = self.tokens.find_by_key(&claims.key).await? else {
            return Ok(());
        };
        if record.user_id.to_string() == claims.sub && self.tokens.revoke(&record).await? {
            info!("User {} logged out", record.user_id);
        }
        Ok(())
    }

    /// Mark an account verified. Returns false for an unknown user.
    pub async fn verify_account(&self, user_id: i64) -> Result<bool, AuthError> {
        self.users.set_verified(user_id, true).await
    }

    /// Ban or unban an account. Banning also ends all of its sessions.
    pub async fn set_account_active(&self, user_id: i64, active: bool) -> Result<bool, AuthError> {
        if !self.users.set_active(user_id, active).await? {
            return Ok(false);
        }
        if !active {
            let revoked = self.tokens.revoke_all_for_user(user_id).await?;
            info!("Banned user {}, revoked {} refresh tokens", user_id, revoked);
        }
        Ok(true)
    }

    /// Hash a password off the async executor
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hash task failed: {e}")))?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verify task failed: {e}")))?
    }

    /// Persist a new refresh record and sign both tokens
    async fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let key = Uuid::new_v4().to_string();

        self.tokens.create(user.id, &key, now + self.refresh_ttl).await?;

        let access_token = self.codec.encode_issued_at(
            AccessClaims {
                sub: user.id.to_string(),
                email: user.email.clone(),
                typ: TokenKind::Access,
            },
            now,
            self.access_ttl,
        )?;
        let refresh_token = self.codec.encode_issued_at(
            RefreshClaims {
                sub: user.id.to_string(),
                email: user.email.clone(),
                typ: TokenKind::Refresh,
                key,
            },
            now,
            self.refresh_ttl,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in_seconds: self.access_ttl.num_seconds(),
            refresh_expires_in_seconds: self.refresh_ttl.num_seconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::HasherConfig;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicBool, Ordering};
    use storefront_db::{Database, NewUser, RefreshTokenRecord};

    fn test_config() -> AuthConfig {
        AuthConfig {
            hasher: HasherConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..AuthConfig::new("test-secret-key")
        }
    }

    async fn setup() -> (Database, AuthService) {
        let db = Database::in_memory().await.unwrap();
        let service =
            AuthService::new(test_config(), Arc::new(db.clone()), Arc::new(db.clone())).unwrap();
        (db, service)
    }

    async fn add_user(
        db: &Database,
        service: &AuthService,
        email: &str,
        verified: bool,
        active: bool,
    ) -> User {
        let password_hash = service.hash_password("password123").await.unwrap();
        let user = db
            .insert_user(NewUser {
                email: email.to_string(),
                name: "Alice".to_string(),
                password_hash,
                verified,
                is_admin: false,
            })
            .await
            .unwrap();
        if !active {
            db.set_user_active(user.id, false).await.unwrap();
        }
        user
    }

    #[tokio::test]
    async fn test_login_issues_pair() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", true, true).await;

        let pair = service.login("alice@example.com", "password123").await.unwrap();
        assert_eq!(pair.expires_in_seconds, 300);
        assert_eq!(pair.refresh_expires_in_seconds, 24 * 3600);
        assert_ne!(pair.access_token, pair.refresh_token);

        let current = service.resolve_current_user(&pair.access_token).await.unwrap();
        assert_eq!(current.id, user.id);

        let refresh = service.codec.decode::<RefreshClaims>(&pair.refresh_token).unwrap();
        assert_eq!(refresh.data.sub, user.id.to_string());
        let record = db.get_refresh_token_by_key(&refresh.data.key).await.unwrap().unwrap();
        assert!(record.is_active());
        assert!(!pair.refresh_token.contains(&user.password_hash));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (db, service) = setup().await;
        add_user(&db, &service, "alice@example.com", true, true).await;
        add_user(&db, &service, "unverified@example.com", false, true).await;
        add_user(&db, &service, "banned@example.com", true, false).await;

        let err = service.login("nobody@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));

        let err = service.login("alice@example.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = service.login("unverified@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotVerified));

        let err = service.login("banned@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountBanned));
    }

    #[tokio::test]
    async fn test_unknown_user_pays_configured_work_factor() {
        let db = Database::in_memory().await.unwrap();
        let hasher = HasherConfig {
            memory_kib: 2048,
            iterations: 3,
            parallelism: 1,
        };
        let config = AuthConfig {
            hasher,
            ..AuthConfig::new("test-secret-key")
        };
        let service = AuthService::new(config, Arc::new(db.clone()), Arc::new(db)).unwrap();

        let parsed = argon2::PasswordHash::new(&service.dummy_hash).unwrap();
        let params = argon2::Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), hasher.memory_kib);
        assert_eq!(params.t_cost(), hasher.iterations);
        assert_eq!(params.p_cost(), hasher.parallelism);

        // A real verification (not a parse failure) runs for unknown users
        assert!(!service.verify_password("password123", &service.dummy_hash).await.unwrap());
        let err = service.login("nobody@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn test_wrong_password_checked_before_account_state() {
        let (db, service) = setup().await;
        add_user(&db, &service, "unverified@example.com", false, true).await;

        let err = service.login("unverified@example.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_refresh_is_single_use() {
        let (db, service) = setup().await;
        add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        let rotated = service.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));

        // The replacement is still good exactly once
        service.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let (db, service) = setup().await;
        add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        let (a, b) = tokio::join!(
            service.refresh(&pair.refresh_token),
            service.refresh(&pair.refresh_token)
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(AuthError::TokenInvalid)))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("auth.db").display());
        let db = Database::new(&url).await.unwrap();
        let service = Arc::new(
            AuthService::new(test_config(), Arc::new(db.clone()), Arc::new(db.clone())).unwrap(),
        );
        add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                let token = pair.refresh_token.clone();
                tokio::spawn(async move { service.refresh(&token).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert!(matches!(e, AuthError::TokenInvalid), "{e}"),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (db, service) = setup().await;
        add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        let err = service.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));

        let err = service.resolve_current_user(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_refresh_with_expired_token() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", true, true).await;

        let issued_at = Utc::now() - Duration::days(2);
        let token = service
            .codec
            .encode_issued_at(
                RefreshClaims {
                    sub: user.id.to_string(),
                    email: user.email.clone(),
                    typ: TokenKind::Refresh,
                    key: "stale".to_string(),
                },
                issued_at,
                Duration::days(1),
            )
            .unwrap();

        let err = service.refresh(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_refresh_with_unknown_key() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", true, true).await;

        let token = service
            .codec
            .encode(
                RefreshClaims {
                    sub: user.id.to_string(),
                    email: user.email.clone(),
                    typ: TokenKind::Refresh,
                    key: "never-issued".to_string(),
                },
                Duration::days(1),
            )
            .unwrap();

        let err = service.refresh(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_refresh_for_banned_user() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        db.set_user_active(user.id, false).await.unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountBanned));
        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_current_user_with_expired_token() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", true, true).await;

        let token = service
            .codec
            .encode_issued_at(
                AccessClaims {
                    sub: user.id.to_string(),
                    email: user.email.clone(),
                    typ: TokenKind::Access,
                },
                Utc::now() - Duration::minutes(10),
                Duration::minutes(5),
            )
            .unwrap();

        let err = service.resolve_current_user(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_current_user_deleted_after_issue() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        db.delete_user(user.id).await.unwrap();

        let err = service.resolve_current_user(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownUser));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let (db, service) = setup().await;
        add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        service.logout(&pair.refresh_token).await.unwrap();
        service.logout(&pair.refresh_token).await.unwrap();
        service.logout("garbage").await.unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_ban_revokes_sessions() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", true, true).await;
        let first = service.login("alice@example.com", "password123").await.unwrap();
        let second = service.login("alice@example.com", "password123").await.unwrap();

        assert!(service.set_account_active(user.id, false).await.unwrap());
        assert!(!service.set_account_active(user.id + 100, false).await.unwrap());

        for pair in [first, second] {
            let err = service.refresh(&pair.refresh_token).await.unwrap_err();
            assert!(matches!(err, AuthError::TokenInvalid));
        }

        assert!(service.set_account_active(user.id, true).await.unwrap());
        service.login("alice@example.com", "password123").await.unwrap();
    }

    #[tokio::test]
    async fn test_registration_to_rotation_scenario() {
        let (db, service) = setup().await;
        let user = add_user(&db, &service, "alice@example.com", false, true).await;

        let err = service.login("alice@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotVerified));

        assert!(service.verify_account(user.id).await.unwrap());

        let pair = service.login("alice@example.com", "password123").await.unwrap();
        assert_eq!(pair.expires_in_seconds, 300);

        service.refresh(&pair.refresh_token).await.unwrap();
        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    /// Store whose inserts can be switched off to simulate a mid-rotation failure
    struct FlakyStore {
        db: Database,
        fail_create: AtomicBool,
    }

    #[async_trait]
    impl RefreshTokenStore for FlakyStore {
        async fn create(
            &self,
            user_id: i64,
            key: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<RefreshTokenRecord, AuthError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(AuthError::Internal("disk full".to_string()));
            }
            self.db.create(user_id, key, expires_at).await
        }

        async fn find_by_key(&self, key: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
            self.db.find_by_key(key).await
        }

        async fn revoke(&self, record: &RefreshTokenRecord) -> Result<bool, AuthError> {
            self.db.revoke(record).await
        }

        async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AuthError> {
            self.db.revoke_all_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_rotation_fails_closed() {
        let db = Database::in_memory().await.unwrap();
        let store = Arc::new(FlakyStore {
            db: db.clone(),
            fail_create: AtomicBool::new(false),
        });
        let service = AuthService::new(test_config(), Arc::new(db.clone()), store.clone()).unwrap();
        add_user(&db, &service, "alice@example.com", true, true).await;
        let pair = service.login("alice@example.com", "password123").await.unwrap();

        store.fail_create.store(true, Ordering::SeqCst);
        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));

        store.fail_create.store(false, Ordering::SeqCst);
        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid));
    }

    #[test]
    fn test_non_positive_ttl_is_rejected() {
        let config = AuthConfig {
            access_ttl: Duration::zero(),
            ..test_config()
        };
        let rt = tokio::runtime::Runtime::new().unwrap();
        let db = rt.block_on(Database::in_memory()).unwrap();
        let result = AuthService::new(config, Arc::new(db.clone()), Arc::new(db));
        assert!(result.is_err());
    }
}
