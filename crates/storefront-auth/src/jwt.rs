//! JWT token encoding and validation

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// HMAC algorithm used to sign tokens
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SigningAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl SigningAlgorithm {
    fn as_jwt(self) -> Algorithm {
        match self {
            SigningAlgorithm::HS256 => Algorithm::HS256,
            SigningAlgorithm::HS384 => Algorithm::HS384,
            SigningAlgorithm::HS512 => Algorithm::HS512,
        }
    }
}

/// Which half of a token pair a token is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claim set: the caller's payload plus issue and expiry times
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims<T> {
    #[serde(flatten)]
    pub data: T,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Access token payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub typ: TokenKind,
}

/// Refresh token payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub typ: TokenKind,
    /// Opaque key of the server-side refresh token record
    pub key: String,
}

/// Signs and verifies expiring tokens with a process-wide secret
///
/// The secret and algorithm are fixed at construction; there is no key
/// rotation.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: SigningAlgorithm,
}

impl TokenCodec {
    /// Create a new codec
    pub fn new(secret: &str, algorithm: SigningAlgorithm) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Sign `data` with `iat = now` and `exp = now + ttl`
    pub fn encode<T: Serialize>(&self, data: T, ttl: Duration) -> Result<String, AuthError> {
        self.encode_issued_at(data, Utc::now(), ttl)
    }

    /// Sign `data` as if issued at `issued_at`
    pub fn encode_issued_at<T: Serialize>(
        &self,
        data: T,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let iat = issued_at.timestamp();
        let claims = Claims {
            data,
            iat,
            exp: iat + ttl.num_seconds(),
        };

        encode(&Header::new(self.algorithm.as_jwt()), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token and return its claims
    ///
    /// Expiry is strict: a token is expired from the second `exp` names.
    /// Every other failure, including a foreign algorithm, is `TokenInvalid`.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<Claims<T>, AuthError> {
        let mut validation = Validation::new(self.algorithm.as_jwt());
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let token_data =
            decode::<Claims<T>>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => {
                        debug!("Rejected token: {}", e);
                        AuthError::TokenInvalid
                    }
                }
            })?;

        if token_data.claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(sub: &str) -> AccessClaims {
        AccessClaims {
            sub: sub.to_string(),
            email: "alice@example.com".to_string(),
            typ: TokenKind::Access,
        }
    }

    #[test]
    fn test_token_encode_and_decode() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);

        let before = Utc::now().timestamp();
        let token = codec.encode(access("1"), Duration::minutes(5)).unwrap();
        let claims = codec.decode::<AccessClaims>(&token).unwrap();

        assert_eq!(claims.data, access("1"));
        assert!(claims.iat >= before);
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);

        let issued_at = Utc::now() - Duration::minutes(10);
        let token = codec
            .encode_issued_at(access("1"), issued_at, Duration::minutes(5))
            .unwrap();

        let result = codec.decode::<AccessClaims>(&token);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_token_expires_at_exp_second() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);

        let issued_at = Utc::now() - Duration::seconds(60);
        let token = codec
            .encode_issued_at(access("1"), issued_at, Duration::seconds(60))
            .unwrap();

        let result = codec.decode::<AccessClaims>(&token);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_invalid_token() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);

        let result = codec.decode::<AccessClaims>("invalid-token");
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);
        let other = TokenCodec::new("another-secret", SigningAlgorithm::HS256);

        let token = other.encode(access("1"), Duration::minutes(5)).unwrap();
        let result = codec.decode::<AccessClaims>(&token);
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn test_algorithm_mismatch_is_invalid() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);
        let other = TokenCodec::new("test-secret-key", SigningAlgorithm::HS512);

        let token = other.encode(access("1"), Duration::minutes(5)).unwrap();
        let result = codec.decode::<AccessClaims>(&token);
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);
        let token = codec.encode(access("1"), Duration::minutes(5)).unwrap();
        let forged = codec.encode(access("2"), Duration::minutes(5)).unwrap();

        // Graft the forged payload onto the original signature
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        let result = codec.decode::<AccessClaims>(&tampered);
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn test_access_token_is_not_a_refresh_token() {
        let codec = TokenCodec::new("test-secret-key", SigningAlgorithm::HS256);
        let token = codec.encode(access("1"), Duration::minutes(5)).unwrap();

        let result = codec.decode::<RefreshClaims>(&token);
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[test]
    fn test_signing_algorithm_serde() {
        let alg: SigningAlgorithm = serde_json::from_str("\"HS384\"").unwrap();
        assert_eq!(alg, SigningAlgorithm::HS384);
        assert_eq!(serde_json::to_string(&SigningAlgorithm::HS512).unwrap(), "\"HS512\"");
    }
}
