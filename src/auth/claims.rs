// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims, identities, and the public user record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims embedded in every access and refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (account ID)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

impl TokenClaims {
    pub fn for_identity(identity: &Identity, issued_at: i64, ttl_secs: u64) -> Self {
        Self {
            sub: identity.subject_id.clone(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs as i64),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.sub.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// Authenticated account identity.
///
/// This is the primary type used throughout the application to represent
/// who a token or login attempt belongs to. Serialized as the `user` object
/// of login responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    /// Account ID (token `sub` claim)
    #[serde(rename = "id")]
    pub subject_id: String,
    pub email: String,
    pub role: Role,
}

impl Identity {
    /// Check if the identity holds one of the allowed roles.
    pub fn has_role(&self, allowed: &[&str]) -> bool {
        self.role.is_any_of(allowed)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&[Role::ADMIN])
    }
}

/// Identity plus account metadata, as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
}

/// Freshly minted access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
