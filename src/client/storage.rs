// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable client storage.
//!
//! Mirrors the browser's `localStorage`: one key/value area shared by every
//! tab of a browser context, with change notifications delivered to the
//! *other* tabs. Only the refresh token is ever written here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::{lock, TabId};

/// Key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

const EVENT_CAPACITY: usize = 64;

/// Per-tab view of durable storage.
pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);

    fn remove(&self, key: &str);
}

/// A write observed by other tabs (`storage` event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed
    pub new_value: Option<String>,
    pub origin: TabId,
}

/// Storage area shared by all tabs of one browser context.
#[derive(Clone)]
pub struct SharedStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    changes: broadcast::Sender<StorageChange>,
}

impl Default for SharedStorage {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            changes,
        }
    }
}

impl SharedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle through which `tab` reads and writes.
    pub fn for_tab(&self, tab: TabId) -> TabStorage {
        TabStorage {
            shared: self.clone(),
            tab,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    /// Snapshot of a key, bypassing any tab.
    pub fn peek(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    fn write(&self, key: &str, new_value: Option<&str>, origin: TabId) {
        let old_value = {
            let mut entries = lock(&self.entries);
            match new_value {
                Some(value) => entries.insert(key.to_string(), value.to_string()),
                None => entries.remove(key),
            }
        };

        if old_value.as_deref() == new_value {
            return;
        }

        // No receivers is fine: nobody is listening yet
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            old_value,
            new_value: new_value.map(str::to_string),
            origin,
        });
    }
}

#[derive(Clone)]
pub struct TabStorage {
    shared: SharedStorage,
    tab: TabId,
}

impl DurableStorage for TabStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.shared.peek(key)
    }

    fn set(&self, key: &str, value: &str) {
        self.shared.write(key, Some(value), self.tab);
    }

    fn remove(&self, key: &str) {
        self.shared.write(key, None, self.tab);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_share_one_area() {
        let shared = SharedStorage::new();
        let a = shared.for_tab(TabId::new());
        let b = shared.for_tab(TabId::new());

        a.set(REFRESH_TOKEN_KEY, "r-1");
        assert_eq!(b.get(REFRESH_TOKEN_KEY).as_deref(), Some("r-1"));

        b.remove(REFRESH_TOKEN_KEY);
        assert!(a.get(REFRESH_TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn changes_carry_origin_and_values() {
        let shared = SharedStorage::new();
        let tab = TabId::new();
        let storage = shared.for_tab(tab);
        let mut changes = shared.subscribe();

        storage.set(REFRESH_TOKEN_KEY, "r-1");
        storage.remove(REFRESH_TOKEN_KEY);

        let set = changes.recv().await.unwrap();
        assert_eq!(set.new_value.as_deref(), Some("r-1"));
        assert_eq!(set.origin, tab);

        let removed = changes.recv().await.unwrap();
        assert_eq!(removed.old_value.as_deref(), Some("r-1"));
        assert!(removed.new_value.is_none());
    }

    #[tokio::test]
    async fn no_op_writes_emit_nothing() {
        let shared = SharedStorage::new();
        let storage = shared.for_tab(TabId::new());
        let mut changes = shared.subscribe();

        storage.remove(REFRESH_TOKEN_KEY);
        storage.set("k", "v");
        storage.set("k", "v");

        let only = changes.recv().await.unwrap();
        assert_eq!(only.key, "k");
        assert!(changes.try_recv().is_err());
    }
}
