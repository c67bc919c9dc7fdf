// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Federated identity verification against Google.
//!
//! The browser obtains a Google ID token (the opaque "credential") and posts
//! it to `/auth/google`. The server exchanges it at Google's `tokeninfo`
//! endpoint and checks:
//!
//! - the endpoint accepted the token (otherwise `InvalidCredentials`)
//! - `aud` equals our registered client id (otherwise `AudienceMismatch`)
//! - `exp` is in the future (otherwise `Expired`)
//! - `email` and `sub` are present (otherwise `InvalidCredentials`)

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::codec::now_secs;
use super::error::AuthError;

/// Verified identity returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub email: String,
    /// Provider subject id (Google `sub`)
    pub subject_id: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an opaque provider credential for a verified identity.
    async fn verify_credential(&self, credential: &str) -> Result<FederatedIdentity, AuthError>;
}

/// Payload of Google's `tokeninfo` endpoint. Numeric claims arrive as strings.
#[derive(Debug, Default, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exp: Option<Value>,
}

impl TokenInfo {
    fn expiry(&self) -> Option<i64> {
        match self.exp.as_ref()? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

/// Apply audience, expiry and payload checks to a `tokeninfo` response.
pub fn validate_token_info(
    info: TokenInfo,
    client_id: &str,
    now: i64,
) -> Result<FederatedIdentity, AuthError> {
    if info.aud.as_deref() != Some(client_id) {
        return Err(AuthError::AudienceMismatch);
    }

    if let Some(exp) = info.expiry() {
        if exp <= now {
            return Err(AuthError::Expired);
        }
    }

    let email = info
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(AuthError::InvalidCredentials)?
        .to_lowercase();
    let subject_id = info
        .sub
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::InvalidCredentials)?;

    Ok(FederatedIdentity {
        email,
        subject_id,
        name: info.name,
    })
}

/// Google ID-token verifier backed by the `tokeninfo` endpoint.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    client_id: String,
    tokeninfo_url: String,
    client: reqwest::Client,
}

impl GoogleIdentityProvider {
    pub fn new(
        client_id: impl Into<String>,
        tokeninfo_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client_id: client_id.into(),
            tokeninfo_url: tokeninfo_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn verify_credential(&self, credential: &str) -> Result<FederatedIdentity, AuthError> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| AuthError::internal("google tokeninfo request", e))?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Google rejected credential");
            return Err(AuthError::InvalidCredentials);
        }

        let info: TokenInfo = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Unreadable tokeninfo payload");
            AuthError::InvalidCredentials
        })?;

        validate_token_info(info, &self.client_id, now_secs())
    }
}
