// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cross-tab session synchronisation.
//!
//! Two transports, chosen once per tab from the browser context's
//! capabilities:
//!
//! - a broadcast channel carrying explicit [`AuthEvent`]s, when available;
//! - otherwise, change notifications on the shared durable storage, where
//!   writing the refresh token reads as a login and removing it as a logout.
//!
//! Either way a tab never observes its own events.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::storage::{SharedStorage, StorageChange, TabStorage, REFRESH_TOKEN_KEY};
use super::TabId;

/// Name of the browser broadcast channel the events travel on.
pub const CHANNEL_NAME: &str = "auth_sync";

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthEventKind {
    Login,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEvent {
    #[serde(rename = "type")]
    pub kind: AuthEventKind,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub origin: TabId,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, origin: TabId) -> Self {
        Self {
            kind,
            timestamp: Utc::now().timestamp_millis(),
            origin,
        }
    }

    /// Interpret a storage change as an auth event. Only the refresh token
    /// key is meaningful.
    pub fn from_storage_change(change: &StorageChange) -> Option<Self> {
        if change.key != REFRESH_TOKEN_KEY {
            return None;
        }
        let kind = match change.new_value {
            Some(_) => AuthEventKind::Login,
            None => AuthEventKind::Logout,
        };
        Some(Self::new(kind, change.origin))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    BroadcastChannel,
    StorageEvents,
}

pub trait SyncPort: Send + Sync {
    fn mode(&self) -> SyncMode;

    /// Announce a session change to the other tabs.
    fn publish(&self, kind: AuthEventKind);

    fn subscribe(&self) -> SyncSubscription;
}

/// Process-wide stand-in for a named browser broadcast channel.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct BroadcastChannelSync {
    hub: BroadcastHub,
    tab: TabId,
}

impl BroadcastChannelSync {
    pub fn new(hub: BroadcastHub, tab: TabId) -> Self {
        Self { hub, tab }
    }
}

impl SyncPort for BroadcastChannelSync {
    fn mode(&self) -> SyncMode {
        SyncMode::BroadcastChannel
    }

    fn publish(&self, kind: AuthEventKind) {
        let event = AuthEvent::new(kind, self.tab);
        debug!(channel = CHANNEL_NAME, ?kind, tab = %self.tab, "Publishing auth event");
        // No other tab open
        let _ = self.hub.sender.send(event);
    }

    fn subscribe(&self) -> SyncSubscription {
        SyncSubscription {
            source: Source::Channel(self.hub.sender.subscribe()),
            tab: self.tab,
        }
    }
}

/// Fallback that rides on durable storage change notifications.
pub struct StorageEventSync {
    storage: SharedStorage,
    tab: TabId,
}

impl StorageEventSync {
    pub fn new(storage: SharedStorage, tab: TabId) -> Self {
        Self { storage, tab }
    }
}

impl SyncPort for StorageEventSync {
    fn mode(&self) -> SyncMode {
        SyncMode::StorageEvents
    }

    // The storage write itself is the announcement.
    fn publish(&self, _kind: AuthEventKind) {}

    fn subscribe(&self) -> SyncSubscription {
        SyncSubscription {
            source: Source::Storage(self.storage.subscribe()),
            tab: self.tab,
        }
    }
}

enum Source {
    Channel(broadcast::Receiver<AuthEvent>),
    Storage(broadcast::Receiver<StorageChange>),
}

/// Stream of auth events raised by other tabs.
pub struct SyncSubscription {
    source: Source,
    tab: TabId,
}

impl SyncSubscription {
    /// Next foreign event, or `None` once the transport is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            let received = match &mut self.source {
                Source::Channel(rx) => rx.recv().await.map(Some),
                Source::Storage(rx) => rx
                    .recv()
                    .await
                    .map(|change| AuthEvent::from_storage_change(&change)),
            };

            match received {
                Ok(Some(event)) if event.origin != self.tab => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, tab = %self.tab, "Auth sync listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// What the browser context offers for cross-tab messaging.
#[derive(Clone)]
pub struct SyncCapabilities {
    broadcast: Option<BroadcastHub>,
    storage: SharedStorage,
}

impl SyncCapabilities {
    pub fn new(broadcast: Option<BroadcastHub>, storage: SharedStorage) -> Self {
        Self { broadcast, storage }
    }

    pub fn supports_broadcast(&self) -> bool {
        self.broadcast.is_some()
    }

    /// Pick the sync transport for `tab`.
    pub fn select(&self, tab: TabId) -> Arc<dyn SyncPort> {
        match &self.broadcast {
            Some(hub) => Arc::new(BroadcastChannelSync::new(hub.clone(), tab)),
            None => Arc::new(StorageEventSync::new(self.storage.clone(), tab)),
        }
    }
}

/// A browser profile: shared durable storage plus an optional broadcast
/// channel. Each [`Tab`] opened from it gets its own id and sync port.
#[derive(Clone)]
pub struct BrowserContext {
    capabilities: SyncCapabilities,
}

impl BrowserContext {
    pub fn new() -> Self {
        Self {
            capabilities: SyncCapabilities::new(Some(BroadcastHub::new()), SharedStorage::new()),
        }
    }

    /// A context whose tabs must fall back to storage events.
    pub fn without_broadcast() -> Self {
        Self {
            capabilities: SyncCapabilities::new(None, SharedStorage::new()),
        }
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.capabilities.storage
    }

    pub fn capabilities(&self) -> &SyncCapabilities {
        &self.capabilities
    }

    pub fn open_tab(&self) -> Tab {
        let id = TabId::new();
        let sync = self.capabilities.select(id);
        debug!(tab = %id, mode = ?sync.mode(), "Opened tab");
        Tab {
            id,
            storage: self.capabilities.storage.for_tab(id),
            sync,
        }
    }
}

impl Default for BrowserContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Tab {
    pub id: TabId,
    pub storage: TabStorage,
    pub sync: Arc<dyn SyncPort>,
}
