// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential validation: email/password and federated (Google) login.
//!
//! Both paths resolve to the account's stored [`Identity`]. Password failures
//! collapse into a single `InvalidCredentials` regardless of whether the email
//! exists, so responses cannot be used to enumerate accounts.

use std::sync::Arc;

use super::claims::Identity;
use super::error::AuthError;
use super::google::IdentityProvider;
use super::password::PasswordScheme;
use super::roles::Role;
use crate::store::{CredentialStore, NewUser, StoreError};

/// Canonical form used for lookups and uniqueness.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Password hashed once at startup so misses cost the same as a mismatch.
const DECOY_PASSWORD: &str = "decoy-password-for-missing-accounts";

pub struct CredentialAuthenticator {
    store: Arc<dyn CredentialStore>,
    passwords: Arc<dyn PasswordScheme>,
    provider: Option<Arc<dyn IdentityProvider>>,
    decoy_hash: Option<String>,
}

impl CredentialAuthenticator {
    pub fn new(store: Arc<dyn CredentialStore>, passwords: Arc<dyn PasswordScheme>) -> Self {
        let decoy_hash = match passwords.hash(DECOY_PASSWORD) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to hash decoy password; account misses skip hashing");
                None
            }
        };
        Self {
            store,
            passwords,
            provider: None,
            decoy_hash,
        }
    }

    /// Enable federated login through `provider`.
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn federated_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn authenticate_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        let record = self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(|e| AuthError::internal("password login lookup", e))?;

        // Unknown and federated-only accounts have no password to match
        let Some((record, stored_hash)) = record.and_then(|r| {
            let hash = r.password_hash.clone()?;
            Some((r, hash))
        }) else {
            self.burn_decoy(password);
            return Err(AuthError::InvalidCredentials);
        };

        let matches = self
            .passwords
            .verify(password, &stored_hash)
            .map_err(|e| AuthError::internal("password verification", e))?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(record.identity())
    }

    /// Spend one verification on the decoy hash; the result is irrelevant.
    fn burn_decoy(&self, password: &str) {
        if let Some(decoy) = &self.decoy_hash {
            let _ = self.passwords.verify(password, decoy);
        }
    }

    pub async fn authenticate_federated(&self, credential: &str) -> Result<Identity, AuthError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            AuthError::internal("federated login", "no identity provider configured")
        })?;
        if credential.trim().is_empty() {
            return Err(AuthError::InvalidInput(
                "Google credential is required".to_string(),
            ));
        }

        let federated = provider.verify_credential(credential).await?;
        let email = normalize_email(&federated.email);

        let existing = self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(|e| AuthError::internal("federated login lookup", e))?;

        let record = match existing {
            Some(record) if record.google_id.is_some() => record,
            Some(mut record) => {
                // First federated login on an existing account binds it permanently
                tracing::warn!(
                    user_id = %record.id,
                    "Binding Google subject to existing account"
                );
                record.google_id = Some(federated.subject_id.clone());
                self.store
                    .update_user(record)
                    .await
                    .map_err(|e| AuthError::internal("bind google id", e))?
            }
            None => {
                let new_user = NewUser {
                    email: email.clone(),
                    password_hash: None,
                    google_id: Some(federated.subject_id.clone()),
                    role: Role::default(),
                };
                match self.store.insert_user(new_user).await {
                    Ok(record) => {
                        tracing::info!(user_id = %record.id, "Created account from Google login");
                        record
                    }
                    Err(StoreError::Conflict(_)) => return Err(AuthError::EmailConflict),
                    Err(e) => return Err(AuthError::internal("create federated account", e)),
                }
            }
        };

        Ok(record.identity())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::google::FederatedIdentity;
    use crate::auth::password::PasswordError;
    use crate::store::InMemoryCredentialStore;
    use async_trait::async_trait;

    /// Reversible scheme so tests skip Argon2's cost.
    pub(crate) struct PlainScheme;

    impl PasswordScheme for PlainScheme {
        fn hash(&self, password: &str) -> Result<String, PasswordError> {
            Ok(format!("plain:{password}"))
        }

        fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
            Ok(stored_hash == format!("plain:{password}"))
        }
    }

    /// Provider that accepts `good:<sub>:<email>` credentials.
    pub(crate) struct StubProvider;

    #[async_trait]
    impl IdentityProvider for StubProvider {
        async fn verify_credential(
            &self,
            credential: &str,
        ) -> Result<FederatedIdentity, AuthError> {
            let parts: Vec<&str> = credential.split(':').collect();
            match parts.as_slice() {
                ["good", sub, email] => Ok(FederatedIdentity {
                    email: email.to_string(),
                    subject_id: sub.to_string(),
                    name: None,
                }),
                ["foreign", ..] => Err(AuthError::AudienceMismatch),
                ["stale", ..] => Err(AuthError::Expired),
                _ => Err(AuthError::InvalidCredentials),
            }
        }
    }

    /// Counts verifications to show every login path does the same work.
    struct CountingScheme {
        verifications: std::sync::atomic::AtomicUsize,
    }

    impl PasswordScheme for CountingScheme {
        fn hash(&self, password: &str) -> Result<String, PasswordError> {
            PlainScheme.hash(password)
        }

        fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
            self.verifications
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            PlainScheme.verify(password, stored_hash)
        }
    }

    async fn seeded() -> (Arc<InMemoryCredentialStore>, CredentialAuthenticator) {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .insert_user(NewUser {
                email: "ada@example.com".to_string(),
                password_hash: Some("plain:correct horse".to_string()),
                google_id: None,
                role: Role::admin(),
            })
            .await
            .unwrap();
        let authenticator = CredentialAuthenticator::new(store.clone(), Arc::new(PlainScheme))
            .with_identity_provider(Arc::new(StubProvider));
        (store, authenticator)
    }

    #[tokio::test]
    async fn password_login_returns_stored_identity() {
        let (_, auth) = seeded().await;
        let identity = auth
            .authenticate_password(" ADA@example.com ", "correct horse")
            .await
            .unwrap();
        assert_eq!(identity.email, "ada@example.com");
        assert_eq!(identity.role, Role::admin());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let (_, auth) = seeded().await;
        let wrong_password = auth
            .authenticate_password("ada@example.com", "nope")
            .await
            .unwrap_err();
        let unknown_email = auth
            .authenticate_password("nobody@example.com", "correct horse")
            .await
            .unwrap_err();

        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.error_code(), unknown_email.error_code());
    }

    #[tokio::test]
    async fn every_login_miss_runs_one_verification() {
        use std::sync::atomic::Ordering;

        let (store, _) = seeded().await;
        let scheme = Arc::new(CountingScheme {
            verifications: Default::default(),
        });
        let auth = CredentialAuthenticator::new(store.clone(), scheme.clone())
            .with_identity_provider(Arc::new(StubProvider));
        auth.authenticate_federated("good:g-1:grace@example.com")
            .await
            .unwrap();

        for (email, password) in [
            ("ada@example.com", "nope"),
            ("nobody@example.com", "correct horse"),
            ("grace@example.com", "anything"),
        ] {
            let before = scheme.verifications.load(Ordering::SeqCst);
            let err = auth.authenticate_password(email, password).await.unwrap_err();
            assert_eq!(err, AuthError::InvalidCredentials);
            assert_eq!(scheme.verifications.load(Ordering::SeqCst), before + 1, "{email}");
        }
    }

    #[tokio::test]
    async fn decoy_never_authenticates() {
        let (store, _) = seeded().await;
        let auth = CredentialAuthenticator::new(store, Arc::new(PlainScheme));
        assert_eq!(
            auth.authenticate_password("nobody@example.com", DECOY_PASSWORD)
                .await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn federated_only_account_cannot_password_login() {
        let (_, auth) = seeded().await;
        auth.authenticate_federated("good:g-1:grace@example.com")
            .await
            .unwrap();
        assert_eq!(
            auth.authenticate_password("grace@example.com", "").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn federated_login_creates_account_with_default_role() {
        let (store, auth) = seeded().await;
        let identity = auth
            .authenticate_federated("good:g-1:grace@example.com")
            .await
            .unwrap();
        assert_eq!(identity.role, Role::user());

        let record = store
            .find_user_by_email("grace@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.google_id.as_deref(), Some("g-1"));
        assert!(record.password_hash.is_none());
    }

    #[tokio::test]
    async fn federated_login_binds_existing_password_account() {
        let (store, auth) = seeded().await;
        let identity = auth
            .authenticate_federated("good:g-ada:Ada@Example.com")
            .await
            .unwrap();

        // Same account, stored role kept, no duplicate
        assert_eq!(identity.role, Role::admin());
        assert_eq!(store.len().await, 1);
        let record = store
            .find_user_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.google_id.as_deref(), Some("g-ada"));
        assert!(record.password_hash.is_some());

        // Repeat login is idempotent
        let again = auth
            .authenticate_federated("good:g-ada:ada@example.com")
            .await
            .unwrap();
        assert_eq!(again, identity);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn provider_failures_propagate() {
        let (_, auth) = seeded().await;
        assert_eq!(
            auth.authenticate_federated("foreign:x").await,
            Err(AuthError::AudienceMismatch)
        );
        assert_eq!(
            auth.authenticate_federated("stale:x").await,
            Err(AuthError::Expired)
        );
        assert_eq!(
            auth.authenticate_federated("forged").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn federated_login_without_provider_is_internal_failure() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let auth = CredentialAuthenticator::new(store, Arc::new(PlainScheme));
        assert!(!auth.federated_enabled());
        assert!(matches!(
            auth.authenticate_federated("good:g:e@example.com").await,
            Err(AuthError::InternalFailure(_))
        ));
    }

    /// Store whose inserts always lose the uniqueness race.
    struct RacingStore;

    #[async_trait]
    impl CredentialStore for RacingStore {
        async fn find_user_by_email(
            &self,
            _email: &str,
        ) -> crate::store::StoreResult<Option<crate::store::UserRecord>> {
            Ok(None)
        }

        async fn find_user_by_id(
            &self,
            _id: &str,
        ) -> crate::store::StoreResult<Option<crate::store::UserRecord>> {
            Ok(None)
        }

        async fn insert_user(
            &self,
            user: NewUser,
        ) -> crate::store::StoreResult<crate::store::UserRecord> {
            Err(StoreError::Conflict(user.email))
        }

        async fn update_user(
            &self,
            user: crate::store::UserRecord,
        ) -> crate::store::StoreResult<crate::store::UserRecord> {
            Ok(user)
        }

        async fn list_users(&self) -> crate::store::StoreResult<Vec<crate::store::UserRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn insert_race_maps_to_email_conflict() {
        let auth = CredentialAuthenticator::new(Arc::new(RacingStore), Arc::new(PlainScheme))
            .with_identity_provider(Arc::new(StubProvider));
        assert_eq!(
            auth.authenticate_federated("good:g-1:race@example.com").await,
            Err(AuthError::EmailConflict)
        );
    }
}
