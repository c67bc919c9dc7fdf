// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Refresh Coordinator
//!
//! Per-tab session engine. Holds the access token in memory only and the
//! refresh token in durable storage.
//!
//! ## Renewal
//!
//! - **Proactive**: after every token install a timer is armed to fire
//!   `renewal_lead` (default 60 s) before the access token's `exp`.
//! - **Reactive**: a call rejected with 401 triggers one refresh and is
//!   replayed once. Login, Google login and refresh calls are never replayed.
//!
//! Both paths share one refresh at a time: whoever arrives while a refresh is
//! in flight waits for its outcome instead of issuing another request. The
//! refresh runs in its own task, so waiters are released even if the caller
//! that started it goes away.
//!
//! ## Failure
//!
//! A failed refresh ends the session: memory and durable storage are
//! cleared, the other tabs are told, and (except during bootstrap) the tab
//! is sent to the login page. Whoever starts a refresh decides whether its
//! failure redirects; joiners inherit that choice.
//!
//! ## Shutdown
//!
//! Timers and the sync listener hang off one `CancellationToken`, cancelled
//! by [`RefreshCoordinator::shutdown`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{GOOGLE_LOGIN_PATH, LOGIN_PATH, PROFILE_PATH, REFRESH_PATH};
use crate::auth::{codec, Identity, LoginResponse, Profile, TokenClaims};

use super::navigator::Navigator;
use super::storage::{DurableStorage, REFRESH_TOKEN_KEY};
use super::sync::{AuthEvent, AuthEventKind, SyncPort, Tab};
use super::transport::{ApiRequest, ApiResponse, AuthTransport};
use super::{lock, ClientError, TabId};

/// How long before `exp` the proactive renewal fires.
pub const DEFAULT_RENEWAL_LEAD: Duration = Duration::from_secs(60);

pub const DEFAULT_LOGIN_PAGE: &str = "/login";

/// Pages a remote logout does not navigate away from.
pub const DEFAULT_PUBLIC_PAGES: &[&str] = &["/login", "/signup", "/home"];

/// Bootstrap retries when another tab replaces the stored session mid-refresh.
const BOOTSTRAP_ATTEMPTS: usize = 3;

/// Calls whose 401 is a real answer, not an expired access token.
const NO_RETRY_PATHS: &[&str] = &[LOGIN_PATH, GOOGLE_LOGIN_PATH, REFRESH_PATH];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Bootstrapping,
    Authenticated,
    Anonymous,
}

/// Snapshot of a tab's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub state: SessionState,
    pub user: Option<Identity>,
}

impl ClientSession {
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub renewal_lead: Duration,
    pub login_page: String,
    pub public_pages: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            renewal_lead: DEFAULT_RENEWAL_LEAD,
            login_page: DEFAULT_LOGIN_PAGE.to_string(),
            public_pages: DEFAULT_PUBLIC_PAGES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl CoordinatorConfig {
    pub fn is_public_page(&self, path: &str) -> bool {
        self.public_pages.iter().any(|page| path.starts_with(page.as_str()))
    }
}

/// The browser-facing ports a coordinator drives.
pub struct ClientPorts {
    pub transport: Arc<dyn AuthTransport>,
    pub storage: Arc<dyn DurableStorage>,
    pub navigator: Arc<dyn Navigator>,
    pub sync: Arc<dyn SyncPort>,
}

/// Delay until the renewal timer should fire. Zero when already inside the
/// lead window.
pub fn renewal_delay(exp: i64, now: i64, lead: Duration) -> Duration {
    let lead = i64::try_from(lead.as_secs()).unwrap_or(i64::MAX);
    let remaining = exp.saturating_sub(lead).saturating_sub(now);
    Duration::from_secs(remaining.max(0) as u64)
}

fn is_retry_exempt(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    NO_RETRY_PATHS.contains(&path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnFailure {
    StayPut,
    RedirectToLogin,
}

type RefreshOutcome = Result<String, ClientError>;

#[derive(Default)]
struct SessionSlot {
    state: SessionState,
    access_token: Option<String>,
    user: Option<Identity>,
    /// Durable refresh token the current access token was obtained with
    refresh_token: Option<String>,
}

struct Inner {
    tab: TabId,
    transport: Arc<dyn AuthTransport>,
    storage: Arc<dyn DurableStorage>,
    navigator: Arc<dyn Navigator>,
    sync: Arc<dyn SyncPort>,
    config: CoordinatorConfig,
    session: Mutex<SessionSlot>,
    renewal: Mutex<Option<CancellationToken>>,
    in_flight: Mutex<Option<watch::Receiver<Option<RefreshOutcome>>>>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(tab: TabId, ports: ClientPorts, config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                tab,
                transport: ports.transport,
                storage: ports.storage,
                navigator: ports.navigator,
                sync: ports.sync,
                config,
                session: Mutex::new(SessionSlot::default()),
                renewal: Mutex::new(None),
                in_flight: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Coordinator for a tab opened from a [`BrowserContext`](super::BrowserContext).
    pub fn for_tab(
        tab: Tab,
        transport: Arc<dyn AuthTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let ports = ClientPorts {
            transport,
            storage: Arc::new(tab.storage),
            navigator,
            sync: tab.sync,
        };
        Self::new(tab.id, ports, CoordinatorConfig::default())
    }

    pub fn tab(&self) -> TabId {
        self.inner.tab
    }

    pub fn session(&self) -> ClientSession {
        let slot = lock(&self.inner.session);
        ClientSession {
            state: slot.state,
            user: slot.user.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.session).state
    }

    pub fn user(&self) -> Option<Identity> {
        lock(&self.inner.session).user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        lock(&self.inner.session).access_token.clone()
    }

    /// Flat role match against the current user; `false` when anonymous.
    pub fn has_role(&self, allowed: &[&str]) -> bool {
        self.user().is_some_and(|user| user.has_role(allowed))
    }

    pub fn renewal_scheduled(&self) -> bool {
        lock(&self.inner.renewal)
            .as_ref()
            .is_some_and(|timer| !timer.is_cancelled())
    }

    /// Start listening to other tabs, then bootstrap.
    pub async fn start(&self) -> SessionState {
        self.listen();
        self.bootstrap().await
    }

    /// Stop timers and the sync listener.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Restore the session from durable storage on load.
    ///
    /// Failure is silent: the tab becomes anonymous without being redirected.
    /// Never returns `Bootstrapping`.
    pub async fn bootstrap(&self) -> SessionState {
        for _ in 0..BOOTSTRAP_ATTEMPTS {
            if let Some(token) = self.access_token() {
                if !self.renewal_scheduled() {
                    if let Ok(claims) = codec::peek_claims(&token) {
                        self.schedule_renewal(claims.exp);
                    }
                }
                return self.state();
            }

            if self.inner.storage.get(REFRESH_TOKEN_KEY).is_none() {
                self.set_state(SessionState::Anonymous);
                return SessionState::Anonymous;
            }

            self.set_state(SessionState::Bootstrapping);
            match self.refresh(OnFailure::StayPut).await {
                Ok(_) => {
                    info!(tab = %self.inner.tab, "Session restored");
                    return self.state();
                }
                Err(ClientError::SessionEnded) => {
                    debug!(tab = %self.inner.tab, "Stored session replaced during bootstrap; retrying");
                }
                Err(e) => {
                    debug!(tab = %self.inner.tab, error = %e, "No session to restore");
                    return self.state();
                }
            }
        }

        warn!(tab = %self.inner.tab, "Stored session kept changing; bootstrap gave up");
        if self.access_token().is_none() {
            self.set_state(SessionState::Anonymous);
        }
        self.state()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let response = self.inner.transport.login(email, password).await?;
        Ok(self.establish(response))
    }

    pub async fn google_login(&self, credential: &str) -> Result<Identity, ClientError> {
        let response = self.inner.transport.google_login(credential).await?;
        Ok(self.establish(response))
    }

    /// End the session here and in every other tab. The server call is
    /// best-effort.
    pub async fn logout(&self) {
        let access_token = self.access_token();
        if let Err(e) = self.inner.transport.logout(access_token.as_deref()).await {
            warn!(tab = %self.inner.tab, error = %e, "Logout request failed; clearing session anyway");
        }
        self.end_session(OnFailure::StayPut);
        info!(tab = %self.inner.tab, "Logged out");
    }

    /// Send an API call with the current access token, refreshing and
    /// replaying it once on 401.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let sent_with = self.access_token();
        let response = self
            .inner
            .transport
            .send(&request, sent_with.as_deref())
            .await?;

        if !response.is_unauthorized() || request.retried || is_retry_exempt(&request.path) {
            return Ok(response);
        }
        request.retried = true;

        // Someone renewed while this call was out; no need for another refresh
        let token = match self.access_token() {
            Some(current) if Some(&current) != sent_with.as_ref() => current,
            _ => self.refresh(OnFailure::RedirectToLogin).await?,
        };

        debug!(tab = %self.inner.tab, path = %request.path, "Replaying request with renewed token");
        Ok(self.inner.transport.send(&request, Some(&token)).await?)
    }

    pub async fn fetch_profile(&self) -> Result<Profile, ClientError> {
        let response = self.execute(ApiRequest::get(PROFILE_PATH)).await?;
        if !response.is_success() {
            return Err(response.into_rejection().into());
        }
        Ok(response.json()?)
    }

    /// Apply a logout announced by another tab. Publishes nothing and makes
    /// no network call.
    pub fn apply_remote_logout(&self) {
        info!(tab = %self.inner.tab, "Session ended in another tab");
        self.clear_session();

        let path = self.inner.navigator.current_path();
        if !self.inner.config.is_public_page(&path) {
            self.redirect_to_login();
        }
    }

    /// Spawn the listener for other tabs' auth events.
    pub fn listen(&self) {
        // Subscribe before spawning so nothing published from here on is missed
        let mut events = self.inner.sync.subscribe();
        let shutdown = self.inner.shutdown.clone();
        let this = self.clone();

        tokio::spawn(async move {
            debug!(tab = %this.inner.tab, mode = ?this.inner.sync.mode(), "Auth sync listener starting");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => this.apply_remote(event).await,
                        None => break,
                    },
                }
            }
            debug!(tab = %this.inner.tab, "Auth sync listener stopped");
        });
    }

    async fn apply_remote(&self, event: AuthEvent) {
        debug!(tab = %self.inner.tab, from = %event.origin, kind = ?event.kind, "Auth event from another tab");
        match event.kind {
            AuthEventKind::Logout => self.apply_remote_logout(),
            AuthEventKind::Login => match self.state() {
                SessionState::Authenticated => self.adopt_remote_session().await,
                _ => {
                    self.bootstrap().await;
                }
            },
        }
    }

    /// Switch to the session another tab just stored, unless it is ours.
    async fn adopt_remote_session(&self) {
        let stored = self.inner.storage.get(REFRESH_TOKEN_KEY);
        let ours = lock(&self.inner.session).refresh_token.clone();
        if stored.is_none() || stored == ours {
            return;
        }

        info!(tab = %self.inner.tab, "Another tab started a new session; adopting it");
        if let Err(e) = self.refresh(OnFailure::RedirectToLogin).await {
            warn!(tab = %self.inner.tab, error = %e, "Failed to adopt session from another tab");
        }
    }

    fn establish(&self, response: LoginResponse) -> Identity {
        self.inner
            .storage
            .set(REFRESH_TOKEN_KEY, &response.refresh_token);
        self.install_access_token(
            &response.access_token,
            Some(response.user.clone()),
            &response.refresh_token,
        );
        self.inner.sync.publish(AuthEventKind::Login);
        info!(tab = %self.inner.tab, user_id = %response.user.subject_id, "Logged in");
        response.user
    }

    fn install_access_token(&self, token: &str, user: Option<Identity>, refresh_token: &str) {
        let claims = codec::peek_claims(token).ok();
        let user = user.or_else(|| claims.as_ref().map(TokenClaims::identity));

        {
            let mut slot = lock(&self.inner.session);
            if let (Some(before), Some(after)) = (&slot.user, &user) {
                if before.subject_id != after.subject_id {
                    info!(
                        tab = %self.inner.tab,
                        from = %before.subject_id,
                        to = %after.subject_id,
                        "Session switched to another account"
                    );
                }
            }
            slot.access_token = Some(token.to_string());
            slot.user = user;
            slot.refresh_token = Some(refresh_token.to_string());
            slot.state = SessionState::Authenticated;
        }

        match claims {
            Some(claims) => self.schedule_renewal(claims.exp),
            None => warn!(tab = %self.inner.tab, "Access token has no readable expiry; renewal not scheduled"),
        }
    }

    fn schedule_renewal(&self, exp: i64) {
        let delay = renewal_delay(exp, codec::now_secs(), self.inner.config.renewal_lead);
        let deadline = tokio::time::Instant::now() + delay;
        let timer = self.inner.shutdown.child_token();
        if let Some(previous) = lock(&self.inner.renewal).replace(timer.clone()) {
            previous.cancel();
        }

        debug!(tab = %self.inner.tab, delay_secs = delay.as_secs(), "Access token renewal scheduled");
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    if let Err(e) = this.refresh(OnFailure::RedirectToLogin).await {
                        warn!(tab = %this.inner.tab, error = %e, "Proactive renewal failed");
                    }
                }
                _ = timer.cancelled() => {}
            }
        });
    }

    fn cancel_renewal(&self) {
        if let Some(timer) = lock(&self.inner.renewal).take() {
            timer.cancel();
        }
    }

    /// Join the refresh in flight, or start one.
    async fn refresh(&self, on_failure: OnFailure) -> RefreshOutcome {
        let mut outcome = {
            let mut in_flight = lock(&self.inner.in_flight);
            match in_flight.as_ref() {
                Some(pending) => {
                    debug!(tab = %self.inner.tab, "Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let (done, pending) = watch::channel(None);
                    *in_flight = Some(pending.clone());
                    let this = self.clone();
                    tokio::spawn(async move { this.run_refresh(done, on_failure).await });
                    pending
                }
            }
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ClientError::SessionEnded)?;
        match &*settled {
            Some(result) => result.clone(),
            None => Err(ClientError::SessionEnded),
        }
    }

    async fn run_refresh(self, done: watch::Sender<Option<RefreshOutcome>>, on_failure: OnFailure) {
        let outcome = match self.exchange_refresh_token().await {
            Ok((access_token, refresh_token)) => {
                self.install_access_token(&access_token, None, &refresh_token);
                Ok(access_token)
            }
            Err(e) => Err(e),
        };
        match &outcome {
            Ok(_) => {}
            Err(ClientError::SessionEnded) => {}
            Err(e) => {
                warn!(tab = %self.inner.tab, error = %e, "Token refresh failed; ending session");
                self.end_session(on_failure);
            }
        }

        // Clear before releasing waiters so the next 401 starts a fresh refresh
        *lock(&self.inner.in_flight) = None;
        let _ = done.send(Some(outcome));
    }

    /// Returns the new access token and the refresh token it was minted from.
    async fn exchange_refresh_token(&self) -> Result<(String, String), ClientError> {
        let refresh_token = self
            .inner
            .storage
            .get(REFRESH_TOKEN_KEY)
            .ok_or(ClientError::NotAuthenticated)?;

        let response = self
            .inner
            .transport
            .refresh(&refresh_token)
            .await
            .map_err(ClientError::RefreshFailed)?;

        if self.inner.storage.get(REFRESH_TOKEN_KEY).as_deref() != Some(refresh_token.as_str()) {
            debug!(tab = %self.inner.tab, "Session changed during refresh; discarding token");
            return Err(ClientError::SessionEnded);
        }

        Ok((response.access_token, refresh_token))
    }

    /// Clear everything and tell the other tabs.
    fn end_session(&self, on_failure: OnFailure) {
        self.clear_session();
        self.inner.sync.publish(AuthEventKind::Logout);
        if on_failure == OnFailure::RedirectToLogin {
            self.redirect_to_login();
        }
    }

    fn clear_session(&self) {
        self.cancel_renewal();
        *lock(&self.inner.session) = SessionSlot {
            state: SessionState::Anonymous,
            ..SessionSlot::default()
        };
        self.inner.storage.remove(REFRESH_TOKEN_KEY);
    }

    fn redirect_to_login(&self) {
        let login_page = &self.inner.config.login_page;
        if self.inner.navigator.current_path() != *login_page {
            self.inner.navigator.navigate(login_page);
        }
    }

    fn set_state(&self, state: SessionState) {
        lock(&self.inner.session).state = state;
    }
}
