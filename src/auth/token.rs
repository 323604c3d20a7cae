//! Session token issuing and verification
//!
//! Session tokens are HS256-signed JWTs carrying [`Claims`]. The verifier pins
//! the algorithm; the `alg` field of an incoming token header is never trusted.
//! Expiry is checked separately from the signature so that an expired token
//! and a forged one fail with different [`TokenError`] kinds.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Algorithm used for every session token
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Signed session claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub user_id: i64,

    /// User email
    pub email: String,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expires at (unix seconds)
    pub exp: i64,
}

impl Claims {
    /// Build claims issued at `iat` and valid for `ttl_secs`
    pub fn new(user_id: i64, email: impl Into<String>, iat: i64, ttl_secs: i64) -> Self {
        Self {
            user_id,
            email: email.into(),
            iat,
            exp: iat.saturating_add(ttl_secs),
        }
    }

    /// Whether the claims are expired at `now` (unix seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

/// Issue a signed session token
///
/// `ttl_secs` may be negative, which yields a token that is already expired.
///
/// # Example
///
/// ```
/// use youdo_api::auth::token::{issue_token, verify_token};
///
/// let token = issue_token(7, "ana@example.com", "secret", 3600).unwrap();
/// let claims = verify_token(&token, "secret").unwrap();
/// assert_eq!(claims.user_id, 7);
/// assert_eq!(claims.exp - claims.iat, 3600);
/// ```
pub fn issue_token(
    user_id: i64,
    email: &str,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, TokenError> {
    let claims = Claims::new(user_id, email, Utc::now().timestamp(), ttl_secs);
    sign_claims(&claims, secret)
}

/// Sign already-built claims
pub fn sign_claims(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    encode(
        &Header::new(TOKEN_ALGORITHM),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify a session token and return its claims
///
/// # Errors
///
/// - [`TokenError::Malformed`] if the token cannot be parsed or names another algorithm
/// - [`TokenError::SignatureInvalid`] if the signature does not match `secret`
/// - [`TokenError::Expired`] if the current time is at or past `exp`
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    verify_token_at(token, secret, Utc::now().timestamp())
}

/// Verify a session token against an explicit clock value
pub fn verify_token_at(token: &str, secret: &str, now: i64) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(TOKEN_ALGORITHM);
    // exp is checked below with `now >= exp` semantics and no leeway
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        _ => TokenError::Malformed,
    })?;

    if data.claims.is_expired_at(now) {
        return Err(TokenError::Expired);
    }

    Ok(data.claims)
}

/// Token issuer/verifier bound to the configured secret and lifetime
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    /// Create a new token service
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Configured token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        issue_token(user_id, email, &self.secret, ttl_secs)
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        verify_token(token, &self.secret)
    }
}
