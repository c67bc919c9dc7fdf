// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store.
//!
//! The store is an external collaborator: the service only needs lookup by
//! email or id, insertion with atomic unique-email enforcement, and updates.
//! [`InMemoryCredentialStore`] backs the server binary and the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{Identity, Profile, Role};

/// Account record as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    /// Absent for accounts created through federated login
    pub password_hash: Option<String>,
    /// Google `sub`, bound on the first federated login
    pub google_id: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.id.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            identity: self.identity(),
            created_at: self.created_at,
        }
    }
}

/// Fields for a new account. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("email already exists: {0}")]
    Conflict(String),

    #[error("user not found: {0}")]
    NotFound(String),

    #[error("credential store unavailable: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<UserRecord>>;

    /// Insert a new account. Fails with [`StoreError::Conflict`] if the email
    /// is taken; the check and the insert are atomic.
    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord>;

    /// Replace an existing account record.
    async fn update_user(&self, user: UserRecord) -> StoreResult<UserRecord>;

    /// All accounts, newest first.
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    /// email -> id
    email_index: HashMap<String, String>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .email_index
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut tables = self.tables.write().await;
        if tables.email_index.contains_key(&user.email) {
            return Err(StoreError::Conflict(user.email));
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: user.email,
            password_hash: user.password_hash,
            google_id: user.google_id,
            role: user.role,
            created_at: Utc::now(),
        };
        tables
            .email_index
            .insert(record.email.clone(), record.id.clone());
        tables.users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_user(&self, user: UserRecord) -> StoreResult<UserRecord> {
        let mut tables = self.tables.write().await;
        let previous_email = match tables.users.get(&user.id) {
            Some(existing) => existing.email.clone(),
            None => return Err(StoreError::NotFound(user.id)),
        };

        if previous_email != user.email {
            if tables.email_index.contains_key(&user.email) {
                return Err(StoreError::Conflict(user.email));
            }
            tables.email_index.remove(&previous_email);
            tables
                .email_index
                .insert(user.email.clone(), user.id.clone());
        }

        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.tables.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: Some("hash".to_string()),
            google_id: None,
            role: Role::user(),
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let store = InMemoryCredentialStore::new();
        let created = store.insert_user(new_user("ada@example.com")).await.unwrap();

        let by_email = store.find_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(by_email, Some(created.clone()));

        let by_id = store.find_user_by_id(&created.id).await.unwrap();
        assert_eq!(by_id, Some(created));

        assert!(store.find_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = InMemoryCredentialStore::new();
        store.insert_user(new_user("ada@example.com")).await.unwrap();
        let err = store.insert_user(new_user("ada@example.com")).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("ada@example.com".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_admit_exactly_one() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert_user(new_user("race@example.com")).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_binds_fields() {
        let store = InMemoryCredentialStore::new();
        let mut record = store.insert_user(new_user("ada@example.com")).await.unwrap();
        record.google_id = Some("google-sub".to_string());
        store.update_user(record.clone()).await.unwrap();

        let stored = store.find_user_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(stored.google_id.as_deref(), Some("google-sub"));
    }

    #[tokio::test]
    async fn update_missing_user_fails() {
        let store = InMemoryCredentialStore::new();
        let ghost = UserRecord {
            id: "ghost".to_string(),
            email: "ghost@example.com".to_string(),
            password_hash: None,
            google_id: None,
            role: Role::user(),
            created_at: Utc::now(),
        };
        assert_eq!(
            store.update_user(ghost).await.unwrap_err(),
            StoreError::NotFound("ghost".to_string())
        );
    }

    #[tokio::test]
    async fn list_users_newest_first() {
        let store = InMemoryCredentialStore::new();
        let first = store.insert_user(new_user("a@example.com")).await.unwrap();
        let mut second = store.insert_user(new_user("b@example.com")).await.unwrap();
        second.created_at = first.created_at + chrono::Duration::seconds(5);
        store.update_user(second.clone()).await.unwrap();

        let users = store.list_users().await.unwrap();
        assert_eq!(users[0].id, second.id);
        assert_eq!(users[1].id, first.id);
    }
}
