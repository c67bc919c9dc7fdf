// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session issuance.
//!
//! Turns successful authentication into a fresh [`TokenPair`], renews access
//! tokens from refresh tokens, and serves profile lookups. Tokens are
//! stateless: nothing is recorded server-side, and a refresh mints a new
//! access token from the refresh token's own claims without re-reading the
//! store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::authenticator::{normalize_email, CredentialAuthenticator};
use super::claims::{Identity, Profile, TokenPair};
use super::codec;
use super::error::AuthError;
use super::password::PasswordScheme;
use super::roles::Role;
use crate::config::AuthSettings;
use crate::store::{CredentialStore, NewUser, StoreError};

const MIN_PASSWORD_LEN: usize = 8;

/// Response body of password and Google login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Identity,
}

/// Response body of `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

pub struct SessionIssuer {
    settings: AuthSettings,
    store: Arc<dyn CredentialStore>,
    passwords: Arc<dyn PasswordScheme>,
    authenticator: CredentialAuthenticator,
}

impl SessionIssuer {
    pub fn new(
        settings: AuthSettings,
        store: Arc<dyn CredentialStore>,
        passwords: Arc<dyn PasswordScheme>,
        authenticator: CredentialAuthenticator,
    ) -> Self {
        Self {
            settings,
            store,
            passwords,
            authenticator,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn federated_enabled(&self) -> bool {
        self.authenticator.federated_enabled()
    }

    /// Mint a fresh access/refresh pair for `identity`.
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, AuthError> {
        let access_token = codec::sign(
            identity,
            &self.settings.access_secret,
            self.settings.access_ttl_secs,
        )
        .map_err(|e| AuthError::internal("sign access token", e))?;
        let refresh_token = codec::sign(
            identity,
            &self.settings.refresh_secret,
            self.settings.refresh_ttl_secs,
        )
        .map_err(|e| AuthError::internal("sign refresh token", e))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let identity = self.authenticator.authenticate_password(email, password).await?;
        tracing::info!(user_id = %identity.subject_id, "Password login succeeded");
        self.login_response(identity)
    }

    pub async fn federated_login(&self, credential: &str) -> Result<LoginResponse, AuthError> {
        let identity = self.authenticator.authenticate_federated(credential).await?;
        tracing::info!(user_id = %identity.subject_id, "Google login succeeded");
        self.login_response(identity)
    }

    fn login_response(&self, identity: Identity) -> Result<LoginResponse, AuthError> {
        let TokenPair {
            access_token,
            refresh_token,
        } = self.issue(&identity)?;
        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: identity,
        })
    }

    /// Exchange a refresh token for a new access token with the same claims.
    pub fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, AuthError> {
        let claims = codec::verify(refresh_token, &self.settings.refresh_secret).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            AuthError::InvalidRefreshToken
        })?;

        let access_token = codec::sign(
            &claims.identity(),
            &self.settings.access_secret,
            self.settings.access_ttl_secs,
        )
        .map_err(|e| AuthError::internal("sign access token", e))?;

        Ok(AccessTokenResponse { access_token })
    }

    /// Verify a bearer access token.
    pub fn verify_access(&self, access_token: &str) -> Result<Identity, AuthError> {
        codec::verify(access_token, &self.settings.access_secret)
            .map(|claims| claims.identity())
            .map_err(|_| AuthError::Unauthorized)
    }

    pub async fn get_profile(&self, subject_id: &str) -> Result<Profile, AuthError> {
        self.store
            .find_user_by_id(subject_id)
            .await
            .map_err(|e| AuthError::internal("profile lookup", e))?
            .map(|record| record.profile())
            .ok_or(AuthError::NotFound)
    }

    /// Create a password account with the default role.
    pub async fn register(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        self.create_password_account(email, password, Role::default())
            .await
    }

    /// Create a password account with an explicit role (startup seeding).
    pub async fn create_password_account(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Profile, AuthError> {
        let email = normalize_email(email);
        validate_registration(&email, password)?;

        let password_hash = self
            .passwords
            .hash(password)
            .map_err(|e| AuthError::internal("hash password", e))?;

        let record = self
            .store
            .insert_user(NewUser {
                email,
                password_hash: Some(password_hash),
                google_id: None,
                role,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::EmailConflict,
                other => AuthError::internal("insert user", other),
            })?;

        tracing::info!(user_id = %record.id, role = %record.role, "Registered account");
        Ok(record.profile())
    }

    /// All accounts, newest first.
    pub async fn list_users(&self) -> Result<Vec<Profile>, AuthError> {
        let users = self
            .store
            .list_users()
            .await
            .map_err(|e| AuthError::internal("list users", e))?;
        Ok(users.iter().map(|record| record.profile()).collect())
    }
}

fn validate_registration(email: &str, password: &str) -> Result<(), AuthError> {
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);
    if !well_formed {
        return Err(AuthError::InvalidInput("A valid email is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::authenticator::tests::{PlainScheme, StubProvider};
    use crate::store::InMemoryCredentialStore;

    pub(crate) fn test_settings() -> AuthSettings {
        AuthSettings::new("test-access-secret", "test-refresh-secret").unwrap()
    }

    pub(crate) fn test_issuer() -> (Arc<InMemoryCredentialStore>, SessionIssuer) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let passwords: Arc<dyn PasswordScheme> = Arc::new(PlainScheme);
        let authenticator = CredentialAuthenticator::new(store.clone(), passwords.clone())
            .with_identity_provider(Arc::new(StubProvider));
        let issuer = SessionIssuer::new(test_settings(), store.clone(), passwords, authenticator);
        (store, issuer)
    }

    #[tokio::test]
    async fn login_issues_distinctly_signed_pair() {
        let (_, issuer) = test_issuer();
        issuer
            .register("ada@example.com", "correct horse")
            .await
            .unwrap();

        let response = issuer.login("ada@example.com", "correct horse").await.unwrap();
        let settings = issuer.settings();

        let access = codec::verify(&response.access_token, &settings.access_secret).unwrap();
        let refresh = codec::verify(&response.refresh_token, &settings.refresh_secret).unwrap();
        assert_eq!(access.identity(), response.user);
        assert_eq!(refresh.identity(), response.user);
        assert_eq!(access.exp - access.iat, 900);
        assert_eq!(refresh.exp - refresh.iat, 604_800);

        // Cross-verification fails both ways
        assert!(codec::verify(&response.refresh_token, &settings.access_secret).is_err());
        assert!(codec::verify(&response.access_token, &settings.refresh_secret).is_err());
    }

    #[tokio::test]
    async fn issue_always_mints_fresh_tokens() {
        let (_, issuer) = test_issuer();
        let identity = Identity {
            subject_id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::user(),
        };
        let first = issuer.issue(&identity).unwrap();
        let claims = codec::verify(&first.access_token, &issuer.settings().access_secret).unwrap();
        assert_eq!(claims.identity(), identity);
    }

    #[tokio::test]
    async fn refresh_keeps_claims_without_store_read() {
        let (store, issuer) = test_issuer();
        let profile = issuer
            .register("ada@example.com", "correct horse")
            .await
            .unwrap();
        let login = issuer.login("ada@example.com", "correct horse").await.unwrap();

        // Promote the stored role: the refreshed token must still carry the old one
        let mut record = store.find_user_by_id(&profile.identity.subject_id).await.unwrap().unwrap();
        record.role = Role::admin();
        store.update_user(record).await.unwrap();

        let refreshed = issuer.refresh(&login.refresh_token).unwrap();
        let identity = issuer.verify_access(&refreshed.access_token).unwrap();
        assert_eq!(identity, login.user);
        assert_eq!(identity.role, Role::user());
    }

    #[test]
    fn refresh_failures_collapse_to_invalid_refresh_token() {
        let (_, issuer) = test_issuer();
        let identity = Identity {
            subject_id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::user(),
        };
        let settings = issuer.settings().clone();

        // Access token presented as refresh token (wrong secret)
        let access = codec::sign(&identity, &settings.access_secret, 900).unwrap();
        assert_eq!(issuer.refresh(&access), Err(AuthError::InvalidRefreshToken));

        // Expired refresh token
        let expired =
            codec::sign_at(&identity, &settings.refresh_secret, 60, codec::now_secs() - 120)
                .unwrap();
        assert_eq!(issuer.refresh(&expired), Err(AuthError::InvalidRefreshToken));

        // Garbage
        assert_eq!(issuer.refresh("garbage"), Err(AuthError::InvalidRefreshToken));
    }

    #[test]
    fn verify_access_rejects_refresh_token() {
        let (_, issuer) = test_issuer();
        let identity = Identity {
            subject_id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::user(),
        };
        let pair = issuer.issue(&identity).unwrap();
        assert_eq!(issuer.verify_access(&pair.access_token), Ok(identity));
        assert_eq!(
            issuer.verify_access(&pair.refresh_token),
            Err(AuthError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn profile_of_deleted_account_is_not_found() {
        let (_, issuer) = test_issuer();
        assert_eq!(issuer.get_profile("ghost").await, Err(AuthError::NotFound));

        let profile = issuer
            .register("ada@example.com", "correct horse")
            .await
            .unwrap();
        let fetched = issuer.get_profile(&profile.identity.subject_id).await.unwrap();
        assert_eq!(fetched, profile);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() {
        let (_, issuer) = test_issuer();
        issuer
            .register("ada@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(
            issuer.register("ADA@example.com", "another one").await,
            Err(AuthError::EmailConflict)
        );
        assert!(matches!(
            issuer.register("not-an-email", "correct horse").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            issuer.register("grace@example.com", "short").await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn federated_login_issues_tokens_for_stored_role() {
        let (_, issuer) = test_issuer();
        issuer
            .create_password_account("mod@example.com", "correct horse", Role::moderator())
            .await
            .unwrap();
        let response = issuer
            .federated_login("good:g-mod:mod@example.com")
            .await
            .unwrap();
        assert_eq!(response.user.role, Role::moderator());
        assert_eq!(issuer.verify_access(&response.access_token), Ok(response.user));
    }

    #[tokio::test]
    async fn list_users_returns_profiles() {
        let (_, issuer) = test_issuer();
        issuer.register("a@example.com", "password-a").await.unwrap();
        issuer.register("b@example.com", "password-b").await.unwrap();
        let users = issuer.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
    }
}
