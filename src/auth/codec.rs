// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed, expiring tokens (HS256 JWT).
//!
//! The codec is pure: every function takes the secret explicitly, and the
//! `_at` variants take the clock explicitly. A token is valid strictly before
//! its `exp`; at `exp` it is expired. No clock-skew leeway is applied to
//! tokens this service mints.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::{Identity, TokenClaims};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Sign `identity` into a token that expires `ttl_secs` from now.
pub fn sign(identity: &Identity, secret: &str, ttl_secs: u64) -> Result<String, TokenError> {
    sign_at(identity, secret, ttl_secs, now_secs())
}

pub fn sign_at(
    identity: &Identity,
    secret: &str,
    ttl_secs: u64,
    issued_at: i64,
) -> Result<String, TokenError> {
    let claims = TokenClaims::for_identity(identity, issued_at, ttl_secs);
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify a token's signature and expiry and return its claims.
pub fn verify(token: &str, secret: &str) -> Result<TokenClaims, TokenError> {
    verify_at(token, secret, now_secs())
}

pub fn verify_at(token: &str, secret: &str, now: i64) -> Result<TokenClaims, TokenError> {
    // Expiry is checked below against the supplied clock
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    })?;

    let claims = token_data.claims;
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

/// Decode claims WITHOUT verifying the signature.
///
/// Only for holders that lack the secret (the browser-side coordinator) and
/// need `exp` to schedule renewal. Never use the result for authorization.
pub fn peek_claims(token: &str) -> Result<TokenClaims, TokenError> {
    jsonwebtoken::dangerous::insecure_decode::<TokenClaims>(token)
        .map(|data| data.claims)
        .map_err(|_| TokenError::Malformed)
}
