// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, process, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use session_auth::{
    api::router,
    auth::{
        Argon2Scheme, AuthError, CredentialAuthenticator, GoogleIdentityProvider, PasswordScheme,
        Role, SessionIssuer,
    },
    config::{AuthSettings, ServerSettings, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    state::AppState,
    store::InMemoryCredentialStore,
};

/// Time in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    init_tracing();

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let auth_settings = AuthSettings::from_env().unwrap_or_else(|e| {
        error!(error = %e, "Invalid auth configuration");
        process::exit(1);
    });
    let server = ServerSettings::from_env().unwrap_or_else(|e| {
        error!(error = %e, "Invalid server configuration");
        process::exit(1);
    });

    // Initialize application state
    let store = Arc::new(InMemoryCredentialStore::new());
    let passwords: Arc<dyn PasswordScheme> = Arc::new(Argon2Scheme::new());
    let mut authenticator = CredentialAuthenticator::new(store.clone(), passwords.clone());

    match &auth_settings.google_client_id {
        Some(client_id) => {
            let provider = GoogleIdentityProvider::new(
                client_id.clone(),
                auth_settings.google_tokeninfo_url.clone(),
            )
            .expect("Failed to create HTTP client");
            authenticator = authenticator.with_identity_provider(Arc::new(provider));
            info!("Google login enabled");
        }
        None => warn!("GOOGLE_CLIENT_ID not set; Google login disabled"),
    }

    let issuer = SessionIssuer::new(auth_settings, store, passwords, authenticator);

    if let Some((email, password)) = &server.seed_admin {
        match issuer
            .create_password_account(email, password, Role::admin())
            .await
        {
            Ok(profile) => info!(user_id = %profile.identity.subject_id, "Seeded admin account"),
            Err(AuthError::EmailConflict) => info!("Seed admin account already exists"),
            Err(e) => warn!(error = %e, "Failed to seed admin account"),
        }
    }

    let app = router(AppState::new(issuer));

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    let addr = server.bind_addr;
    match &server.tls {
        Some(paths) => {
            let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
                .await
                .expect("Failed to load TLS certificate and key");

            info!(%addr, "Session auth server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            warn!(%addr, "TLS not configured; serving plain HTTP (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    info!("Server stopped");
}

/// JSON lines when `LOG_FORMAT=json`, human-readable otherwise. `RUST_LOG`
/// overrides the default filter.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

async fn shutdown_signal(handle: Handle<SocketAddr>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received; draining connections");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
