// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Client
//!
//! The browser-side half of the session: one [`RefreshCoordinator`] per tab
//! owns the in-memory access token, persists the refresh token, renews ahead
//! of expiry, replays requests rejected with 401, and keeps sibling tabs on
//! the same session through a [`SyncPort`].
//!
//! The browser itself is abstracted behind ports so the engine runs headless:
//!
//! - [`DurableStorage`] - `localStorage` shared by all tabs
//! - [`SyncPort`] - broadcast channel or storage-event fallback
//! - [`Navigator`] - forced navigation to the login page
//! - [`AuthTransport`] - the HTTP API ([`HttpTransport`] in production)

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod coordinator;
pub mod http;
pub mod navigator;
pub mod storage;
pub mod sync;
pub mod transport;

pub use coordinator::{
    ClientPorts, ClientSession, CoordinatorConfig, RefreshCoordinator, SessionState,
};
pub use http::HttpTransport;
pub use navigator::{MemoryNavigator, Navigator};
pub use storage::{DurableStorage, SharedStorage, TabStorage, REFRESH_TOKEN_KEY};
pub use sync::{
    AuthEvent, AuthEventKind, BrowserContext, SyncCapabilities, SyncMode, SyncPort, Tab,
};
pub use transport::{ApiRequest, ApiResponse, AuthTransport, TransportError};

/// Identifies one tab of a browser context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The server rejected or never answered a foreground call
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("token refresh failed: {0}")]
    RefreshFailed(TransportError),

    #[error("no refresh token stored")]
    NotAuthenticated,

    /// The session was replaced or ended while a refresh was in flight
    #[error("session ended during refresh")]
    SessionEnded,
}

// Session slots hold plain data; a poisoned lock still holds a usable value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
