// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for bearer-authenticated identities.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is Identity
//! }
//! ```

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, Identity, Role};
use crate::state::AppState;

/// Extractor for authenticated identities.
///
/// Validates the access token from the `Authorization: Bearer` header with
/// the access secret. Any verification failure (bad signature, expiry,
/// malformed token, refresh token presented instead) is `Unauthorized`.
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let identity = state.issuer.verify_access(token)?;

        Ok(Auth(identity))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Set of role strings an endpoint accepts.
pub trait AllowedRoles {
    const ROLES: &'static [&'static str];
}

pub struct Admins;

impl AllowedRoles for Admins {
    const ROLES: &'static [&'static str] = &[Role::ADMIN];
}

/// Admins and moderators.
pub struct Staff;

impl AllowedRoles for Staff {
    const ROLES: &'static [&'static str] = &[Role::ADMIN, Role::MODERATOR];
}

/// Extractor that requires the identity's role to be one of `R::ROLES`.
pub struct RequireRole<R: AllowedRoles>(pub Identity, PhantomData<R>);

impl<R: AllowedRoles> RequireRole<R> {
    pub fn identity(&self) -> &Identity {
        &self.0
    }
}

impl<R: AllowedRoles + Send + Sync> FromRequestParts<AppState> for RequireRole<R> {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(identity) = Auth::from_request_parts(parts, state).await?;

        if !identity.has_role(R::ROLES) {
            tracing::debug!(
                user_id = %identity.subject_id,
                role = %identity.role,
                "Role not permitted"
            );
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(RequireRole(identity, PhantomData))
    }
}

/// Extractor that requires the `admin` role.
pub type AdminOnly = RequireRole<Admins>;

/// Extractor that requires `admin` or `moderator`.
pub type StaffOnly = RequireRole<Staff>;

/// Optional authentication extractor.
///
/// Returns `None` if no valid authentication is present, instead of rejecting.
pub struct OptionalAuth(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(identity)) => Ok(OptionalAuth(Some(identity))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}
