//! Bearer token verification.
//!
//! Tokens are issued by the identity service; this side only checks the
//! HS256 signature and expiry and hands back the claims.

use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use thiserror::Error;

use crate::auth::Claims;

/// Verification settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret the identity service signs with.
    pub secret: String,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            leeway_secs: 60,
        }
    }
}

/// Why a token was rejected.
#[derive(Debug, Error)]
pub enum JwtError {
    /// Bad signature, malformed token or unexpected claims.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Token has expired.
    #[error("token has expired")]
    Expired,
}

/// Verifies bearer tokens.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("decoding_key", &"[hidden]")
            .field("leeway", &self.validation.leeway)
            .finish()
    }
}

impl JwtService {
    /// Creates a verifier for tokens signed with `config.secret`.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::default();
        validation.leeway = config.leeway_secs;
        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Validates and decodes a token.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired` if the token has expired.
    /// Returns `JwtError::Invalid` for any other verification failure.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}
