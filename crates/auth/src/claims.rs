//! Bearer token verification.
//!
//! Tokens are HMAC-signed JWTs carrying the caller's numeric id in `user_id`.
//! Every failure (missing header, wrong scheme, bad signature, expiry, bad
//! subject) is a `TokenError`; the HTTP layer collapses all of them into one
//! `Unauthorized` so callers cannot tell them apart.

use std::collections::HashSet;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use corpreg_core::UserId;

const BEARER_SCHEME: &str = "Bearer";

/// Token payload.
///
/// `exp` is checked when present; tokens without `exp` never expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject id, decimal. Issuers send it either as a string or a number.
    pub user_id: SubjectRepr,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectRepr {
    Text(String),
    Number(i64),
}

/// Identity of the caller for the duration of one request. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("auth parsing error: JWT is empty")]
    Missing,

    #[error("auth error: token has expired")]
    Expired,

    #[error("auth error: invalid signature")]
    Signature,

    #[error("auth error: malformed token: {0}")]
    Malformed(String),

    #[error("auth error: invalid subject: {0}")]
    InvalidSubject(String),
}

/// Verifies a raw (scheme-less) token and yields the caller identity.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<CallerIdentity, TokenError>;
}

/// Symmetric (HS256/HS384/HS512) verifier using a shared secret.
pub struct HmacTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl HmacTokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl core::fmt::Debug for HmacTokenVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HmacTokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> Result<CallerIdentity, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::Signature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        let user_id = match data.claims.user_id {
            SubjectRepr::Number(n) => UserId::new(n),
            SubjectRepr::Text(s) => s
                .parse::<UserId>()
                .map_err(|e| TokenError::InvalidSubject(e.to_string()))?,
        };

        Ok(CallerIdentity { user_id })
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Everything after the `Bearer` scheme word is the token (surrounding
/// whitespace trimmed). A missing header, another scheme, or an empty token are
/// all `TokenError::Missing`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, TokenError> {
    let token = header
        .and_then(|h| h.trim_start().strip_prefix(BEARER_SCHEME))
        .map(str::trim)
        .ok_or(TokenError::Missing)?;

    if token.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

/// VerifyUser: bearer header in, caller identity out.
pub fn verify_user(
    verifier: &dyn TokenVerifier,
    authorization: Option<&str>,
) -> Result<CallerIdentity, TokenError> {
    let token = bearer_token(authorization)?;
    verifier.verify(token)
}
